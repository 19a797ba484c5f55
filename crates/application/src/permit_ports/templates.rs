use async_trait::async_trait;
use ptw_core::{AppResult, WorkspaceId};
use ptw_domain::{PermitTemplate, TemplateId, TemplateRef};

use super::AuditEvent;

/// Repository port for versioned permit templates.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Returns the highest published version of a template.
    async fn find_latest_template(
        &self,
        workspace_id: WorkspaceId,
        template_id: TemplateId,
    ) -> AppResult<Option<PermitTemplate>>;

    /// Returns one pinned template snapshot.
    async fn find_template_version(
        &self,
        workspace_id: WorkspaceId,
        reference: TemplateRef,
    ) -> AppResult<Option<PermitTemplate>>;

    /// Inserts a new snapshot together with its audit event.
    ///
    /// Fails with a conflict when the version already exists.
    async fn insert_template_version(
        &self,
        workspace_id: WorkspaceId,
        template: PermitTemplate,
        audit_event: AuditEvent,
    ) -> AppResult<()>;
}
