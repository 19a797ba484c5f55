use std::sync::Arc;

use ptw_core::{ActorContext, AppError, AppResult, NonEmptyString, WorkspaceId};
use ptw_domain::{
    ApprovalDecision, ApprovalEvent, ApprovalMode, ApprovalPlan, ApprovalProgress, AuditAction,
    ChecklistItem, Permit, PermitAction, PermitId, PermitMetadata, PermitResolution, PermitSource,
    PermitStatus, PermitStatusUpdate, PermitTask, PermitTemplate, TemplateId, TemplateRef,
    approval_progress, ensure_transition, unchecked_required_labels,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::notification_dispatcher::NotificationDispatcher;
use crate::permit_ports::{
    ApprovalCommit, AuditEvent, AuditRepository, Clock, CredentialRepository, PermitRepository,
    StatusChangeCommit, SystemClock, TemplateRepository,
};

mod checklist;
mod create;
mod decision;
mod detail;
mod gates;
mod transition;

pub use create::CreatePermitInput;
pub use decision::{DecisionInput, DecisionOutcome};
pub use detail::PermitDetail;
pub use transition::{TransitionInput, TransitionOutcome};

/// Actor recorded for transitions requested by periodic triggers.
pub const SCHEDULER_ACTOR: &str = "trigger:scheduler";

/// Permit workflow orchestrator.
///
/// Every operation reloads the permit, evaluates it, and hands a single commit
/// to the repository, which re-validates against locked state before writing.
#[derive(Clone)]
pub struct PermitWorkflowService {
    permit_repository: Arc<dyn PermitRepository>,
    template_repository: Arc<dyn TemplateRepository>,
    credential_repository: Arc<dyn CredentialRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl PermitWorkflowService {
    /// Creates a workflow service using the system clock.
    #[must_use]
    pub fn new(
        permit_repository: Arc<dyn PermitRepository>,
        template_repository: Arc<dyn TemplateRepository>,
        credential_repository: Arc<dyn CredentialRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            permit_repository,
            template_repository,
            credential_repository,
            audit_repository,
            notifications,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn load_permit(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Permit> {
        self.permit_repository
            .find_permit(workspace_id, permit_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "permit '{permit_id}' does not exist in workspace '{workspace_id}'"
                ))
            })
    }

    async fn load_pinned_template(&self, permit: &Permit) -> AppResult<Option<PermitTemplate>> {
        let Some(reference) = permit.template else {
            return Ok(None);
        };

        self.template_repository
            .find_template_version(permit.workspace_id, reference)
            .await?
            .map(Some)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "template '{}' version {} pinned by permit '{}' does not exist",
                    reference.template_id, reference.version, permit.id
                ))
            })
    }

    /// Appends a refusal audit event. Refusals change nothing, so a failed
    /// write is logged and the refusal is still reported.
    async fn record_refusal(&self, event: AuditEvent) {
        let action = event.action.as_str();
        let workspace_id = event.workspace_id;
        if let Err(error) = self.audit_repository.append_event(event).await {
            warn!(
                workspace_id = %workspace_id,
                action,
                error = %error,
                "failed to record refusal audit event"
            );
        }
    }
}

fn required_text(field: &str, value: Option<String>) -> AppResult<String> {
    NonEmptyString::for_field(field, value.unwrap_or_default()).map(String::from)
}

fn ensure_mutable(permit: &Permit) -> AppResult<()> {
    if permit.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "permit '{}' is {} and can no longer change",
            permit.id, permit.status
        )));
    }

    Ok(())
}
