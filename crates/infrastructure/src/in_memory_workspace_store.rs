//! Process-local store implementing every persistence port.
//!
//! Used by the API in development mode and by HTTP tests. All state sits
//! behind one lock so status commits observe and write atomically, which is
//! the same guarantee the PostgreSQL adapter gets from `SELECT ... FOR UPDATE`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use ptw_application::{AttemptInfo, AuditEvent, NotificationRecord, WorkspaceSummary};
use ptw_core::{AppError, AppResult, WorkspaceId, WorkspaceRole};
use ptw_domain::{
    ApprovalEvent, ChecklistItem, Permit, PermitId, PermitTask, PermitTemplate,
    QualificationRecord, ReminderSettings, TrainingCompletion,
};

mod catalog;
mod permits;
mod records;

#[cfg(test)]
mod tests;

#[derive(Debug, Default)]
struct StoreState {
    workspaces: Vec<WorkspaceSummary>,
    members: Vec<(WorkspaceId, WorkspaceRole, String)>,
    permits: HashMap<PermitId, Permit>,
    activation_blocked: HashSet<PermitId>,
    approvals: Vec<(WorkspaceId, ApprovalEvent)>,
    checklist_items: Vec<(WorkspaceId, ChecklistItem)>,
    tasks: Vec<(WorkspaceId, PermitTask)>,
    templates: Vec<(WorkspaceId, PermitTemplate)>,
    qualifications: Vec<(WorkspaceId, String, QualificationRecord)>,
    training_completions: Vec<(WorkspaceId, String, TrainingCompletion)>,
    audit_events: Vec<AuditEvent>,
    notifications: Vec<NotificationRecord>,
    reminder_settings: HashMap<WorkspaceId, ReminderSettings>,
    reminder_deliveries: HashSet<String>,
    rate_limits: HashMap<String, AttemptInfo>,
}

impl StoreState {
    fn permit(&self, workspace_id: WorkspaceId, permit_id: PermitId) -> Option<&Permit> {
        self.permits
            .get(&permit_id)
            .filter(|permit| permit.workspace_id == workspace_id)
    }

    fn open_permit(&self, workspace_id: WorkspaceId, permit_id: PermitId) -> AppResult<&Permit> {
        let permit = self
            .permit(workspace_id, permit_id)
            .ok_or_else(|| AppError::NotFound(format!("permit '{permit_id}' does not exist")))?;
        if permit.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "permit '{}' is {} and can no longer change",
                permit.id, permit.status
            )));
        }

        Ok(permit)
    }
}

/// In-memory workspace store.
#[derive(Debug, Default)]
pub struct InMemoryWorkspaceStore {
    state: RwLock<StoreState>,
}

impl InMemoryWorkspaceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a workspace and returns its identifier.
    pub async fn add_workspace(&self, name: &str) -> WorkspaceId {
        let workspace_id = WorkspaceId::new();
        self.state.write().await.workspaces.push(WorkspaceSummary {
            workspace_id,
            name: name.to_owned(),
        });
        workspace_id
    }

    /// Adds a member holding `role` in the workspace.
    pub async fn add_member(&self, workspace_id: WorkspaceId, role: WorkspaceRole, email: &str) {
        self.state
            .write()
            .await
            .members
            .push((workspace_id, role, email.to_owned()));
    }

    /// Records a contractor qualification.
    pub async fn add_qualification(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
        record: QualificationRecord,
    ) {
        self.state
            .write()
            .await
            .qualifications
            .push((workspace_id, contractor_id.to_owned(), record));
    }

    /// Records a completed training module.
    pub async fn add_training_completion(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
        completion: TrainingCompletion,
    ) {
        self.state
            .write()
            .await
            .training_completions
            .push((workspace_id, contractor_id.to_owned(), completion));
    }

    /// Overrides reminder settings for a workspace.
    pub async fn set_reminder_settings(&self, workspace_id: WorkspaceId, settings: ReminderSettings) {
        self.state
            .write()
            .await
            .reminder_settings
            .insert(workspace_id, settings);
    }

    /// Returns every audit event in write order.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.state.read().await.audit_events.clone()
    }

    /// Returns every recorded notification outcome.
    pub async fn notification_records(&self) -> Vec<NotificationRecord> {
        self.state.read().await.notifications.clone()
    }
}

#[async_trait]
impl ptw_application::AuditRepository for InMemoryWorkspaceStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.state.write().await.audit_events.push(event);
        Ok(())
    }
}

fn window_expired(info: &AttemptInfo, window_seconds: i64, now: DateTime<Utc>) -> bool {
    info.window_started_at + chrono::Duration::seconds(window_seconds) <= now
}
