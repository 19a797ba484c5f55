use async_trait::async_trait;
use ptw_core::{AppResult, WorkspaceId};
use ptw_domain::{AuditAction, PermitId};
use serde_json::Value;

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Workspace scope for the event.
    pub workspace_id: WorkspaceId,
    /// Actor that performed or attempted the action.
    pub actor: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Object type label.
    pub object_type: String,
    /// Object identifier.
    pub object_id: String,
    /// Structured detail.
    pub payload: Value,
}

impl AuditEvent {
    /// Builds an event about one permit.
    #[must_use]
    pub fn for_permit(
        workspace_id: WorkspaceId,
        actor: &str,
        action: AuditAction,
        permit_id: PermitId,
        payload: Value,
    ) -> Self {
        Self {
            workspace_id,
            actor: actor.to_owned(),
            action,
            object_type: "permit".to_owned(),
            object_id: permit_id.to_string(),
            payload,
        }
    }
}

/// Port for persisting append-only audit events.
///
/// State-changing commits write their audit row through the permit repository
/// so both land together. This port records refusals, which change nothing.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
