use async_trait::async_trait;
use ptw_core::{AppResult, WorkspaceId, WorkspaceRole};

/// Workspace identity used for job fan-out and email copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSummary {
    /// Workspace identifier.
    pub workspace_id: WorkspaceId,
    /// Display name.
    pub name: String,
}

/// Read port over workspaces and their members.
#[async_trait]
pub trait WorkspaceDirectory: Send + Sync {
    /// Lists every workspace.
    async fn list_workspaces(&self) -> AppResult<Vec<WorkspaceSummary>>;

    /// Loads one workspace.
    async fn find_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Option<WorkspaceSummary>>;

    /// Lists email addresses of members holding any of `roles`.
    async fn list_member_emails(
        &self,
        workspace_id: WorkspaceId,
        roles: &[WorkspaceRole],
    ) -> AppResult<Vec<String>>;
}
