use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ptw_core::{AppResult, WorkspaceId};
use ptw_domain::{
    ApprovalEvent, ApprovalPlan, ApprovalProgress, AuditAction, ChecklistItem, Permit, PermitId,
    PermitStatus, PermitStatusUpdate, PermitTask, approval_progress,
};
use serde_json::json;

use super::AuditEvent;

/// One status write with everything that must land alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeCommit {
    /// Permit to update.
    pub permit_id: PermitId,
    /// Status the caller observed; a mismatch at commit time is a conflict.
    pub expected_status: PermitStatus,
    /// Status write.
    pub update: PermitStatusUpdate,
    /// Decision that caused the change, if any.
    pub approval_event: Option<ApprovalEvent>,
    /// Task created by the change, if any.
    pub task: Option<PermitTask>,
    /// Audit record for the change.
    pub audit_event: AuditEvent,
}

/// An `approved` decision whose effect depends on the events already stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalCommit {
    /// Permit being approved.
    pub permit_id: PermitId,
    /// Decision to append.
    pub event: ApprovalEvent,
    /// Chain the permit must complete.
    pub plan: ApprovalPlan,
    /// Non-blocking gate warnings captured with the decision.
    pub warnings: Vec<String>,
}

/// Effect of an approval once the stored events are known.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalResolution {
    /// Progress including the new event.
    pub progress: ApprovalProgress,
    /// Move to `approved` when the chain is complete.
    pub update: Option<PermitStatusUpdate>,
    /// Audit record for the decision.
    pub audit_event: AuditEvent,
}

/// Result returned by [`PermitRepository::commit_approval`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalCommitted {
    /// Permit after the commit.
    pub permit: Permit,
    /// Progress including the new event.
    pub progress: ApprovalProgress,
}

impl ApprovalCommit {
    /// Status the permit must hold for the approval to apply.
    pub const EXPECTED_STATUS: PermitStatus = PermitStatus::Submitted;

    /// Resolves the approval against the events recorded before it.
    ///
    /// Repositories call this inside their transaction, after locking the
    /// permit, so concurrent approvals each see the other's event.
    #[must_use]
    pub fn resolve(&self, permit: &Permit, recorded_events: &[ApprovalEvent]) -> ApprovalResolution {
        let mut events = recorded_events.to_vec();
        events.push(self.event.clone());
        let progress = approval_progress(&self.plan, &events);

        let (update, action) = if progress.is_complete() {
            (
                Some(PermitStatusUpdate::status_only(
                    permit,
                    PermitStatus::Approved,
                    self.event.decided_at,
                )),
                AuditAction::PermitApproved,
            )
        } else {
            (None, AuditAction::PermitApprovalRecorded)
        };

        ApprovalResolution {
            progress,
            update,
            audit_event: AuditEvent::for_permit(
                permit.workspace_id,
                &self.event.actor_id,
                action,
                permit.id,
                json!({
                    "decision": self.event.decision.as_str(),
                    "mode": self.event.mode.as_str(),
                    "actor_role": self.event.actor_role.as_str(),
                    "comment": self.event.comment,
                    "approved_count": progress.approved_count,
                    "total_steps": progress.total_steps,
                    "next_role": progress.next_role.map(|role| role.as_str()),
                    "warnings": self.warnings,
                }),
            ),
        }
    }
}

/// Repository port for permits and their object graph.
///
/// Every method is scoped by workspace. Commit methods are atomic: they lock
/// the permit, re-check its status and the status machine edge, and write the
/// permit, its related rows and the audit event together or not at all.
#[async_trait]
pub trait PermitRepository: Send + Sync {
    /// Inserts a new permit with its creation audit event.
    async fn insert_permit(&self, permit: Permit, audit_event: AuditEvent) -> AppResult<()>;

    /// Loads one permit.
    async fn find_permit(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Option<Permit>>;

    /// Lists decisions in chronological order.
    async fn list_approval_events(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ApprovalEvent>>;

    /// Lists checklist items in creation order.
    async fn list_checklist_items(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ChecklistItem>>;

    /// Lists tasks in creation order.
    async fn list_tasks(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<PermitTask>>;

    /// Lists `approved` permits whose `start_at` is at or before `now`.
    ///
    /// Permits marked with [`Self::mark_activation_blocked`] are left out
    /// until one of their checklist items is saved again.
    async fn list_permits_due_for_activation(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>>;

    /// Keeps an `approved` permit out of activation runs after its checklist
    /// refused activation. Saving a checklist item clears the mark.
    async fn mark_activation_blocked(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
        blocked_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Lists `approved` or `active` permits whose `end_at` is before `now`.
    async fn list_permits_past_end(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>>;

    /// Applies a status change atomically and returns the updated permit.
    async fn commit_status_change(
        &self,
        workspace_id: WorkspaceId,
        commit: StatusChangeCommit,
    ) -> AppResult<Permit>;

    /// Appends an approval and completes the chain when the stored events allow.
    async fn commit_approval(
        &self,
        workspace_id: WorkspaceId,
        commit: ApprovalCommit,
    ) -> AppResult<ApprovalCommitted>;

    /// Inserts or updates a checklist item on a non-terminal permit.
    async fn save_checklist_item(
        &self,
        workspace_id: WorkspaceId,
        item: ChecklistItem,
        audit_event: AuditEvent,
    ) -> AppResult<()>;

    /// Updates a task on a non-terminal permit.
    async fn save_task(
        &self,
        workspace_id: WorkspaceId,
        task: PermitTask,
        audit_event: AuditEvent,
    ) -> AppResult<()>;
}

