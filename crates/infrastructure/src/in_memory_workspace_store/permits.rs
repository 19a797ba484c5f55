use ptw_application::{ApprovalCommit, ApprovalCommitted, PermitRepository, StatusChangeCommit};
use ptw_domain::PermitStatus;

use super::*;

fn scoped<T: Clone>(
    rows: &[(WorkspaceId, T)],
    workspace_id: WorkspaceId,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    rows.iter()
        .filter(|(stored_workspace, row)| *stored_workspace == workspace_id && keep(row))
        .map(|(_, row)| row.clone())
        .collect()
}

fn upsert<T>(
    rows: &mut Vec<(WorkspaceId, T)>,
    workspace_id: WorkspaceId,
    row: T,
    same: impl Fn(&T) -> bool,
) {
    match rows.iter_mut().find(|(_, stored)| same(stored)) {
        Some(existing) => existing.1 = row,
        None => rows.push((workspace_id, row)),
    }
}

fn due_permits(
    state: &StoreState,
    workspace_id: WorkspaceId,
    limit: usize,
    due_at: impl Fn(&Permit) -> Option<DateTime<Utc>>,
) -> Vec<Permit> {
    let mut due: Vec<(DateTime<Utc>, &Permit)> = state
        .permits
        .values()
        .filter(|permit| permit.workspace_id == workspace_id)
        .filter_map(|permit| due_at(permit).map(|at| (at, permit)))
        .collect();
    due.sort_by_key(|(at, permit)| (*at, permit.id.as_uuid()));

    due.into_iter()
        .take(limit)
        .map(|(_, permit)| permit.clone())
        .collect()
}

#[async_trait]
impl PermitRepository for InMemoryWorkspaceStore {
    async fn insert_permit(&self, permit: Permit, audit_event: AuditEvent) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.permits.contains_key(&permit.id) {
            return Err(AppError::Conflict(format!(
                "permit '{}' already exists",
                permit.id
            )));
        }

        state.permits.insert(permit.id, permit);
        state.audit_events.push(audit_event);
        Ok(())
    }

    async fn find_permit(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Option<Permit>> {
        Ok(self
            .state
            .read()
            .await
            .permit(workspace_id, permit_id)
            .cloned())
    }

    async fn list_approval_events(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ApprovalEvent>> {
        let state = self.state.read().await;
        Ok(scoped(&state.approvals, workspace_id, |event| {
            event.permit_id == permit_id
        }))
    }

    async fn list_checklist_items(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ChecklistItem>> {
        let state = self.state.read().await;
        Ok(scoped(&state.checklist_items, workspace_id, |item| {
            item.permit_id == permit_id
        }))
    }

    async fn list_tasks(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<PermitTask>> {
        let state = self.state.read().await;
        Ok(scoped(&state.tasks, workspace_id, |task| task.permit_id == permit_id))
    }

    async fn list_permits_due_for_activation(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        let state = self.state.read().await;
        Ok(due_permits(&state, workspace_id, limit, |permit| {
            permit.start_at.filter(|start_at| {
                permit.status == PermitStatus::Approved
                    && *start_at <= now
                    && !state.activation_blocked.contains(&permit.id)
            })
        }))
    }

    async fn mark_activation_blocked(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
        _blocked_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .permit(workspace_id, permit_id)
            .is_some_and(|permit| permit.status == PermitStatus::Approved)
        {
            state.activation_blocked.insert(permit_id);
        }
        Ok(())
    }

    async fn list_permits_past_end(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        let state = self.state.read().await;
        Ok(due_permits(&state, workspace_id, limit, |permit| {
            permit.end_at.filter(|end_at| {
                matches!(permit.status, PermitStatus::Approved | PermitStatus::Active)
                    && *end_at < now
            })
        }))
    }

    async fn commit_status_change(
        &self,
        workspace_id: WorkspaceId,
        commit: StatusChangeCommit,
    ) -> AppResult<Permit> {
        let mut state = self.state.write().await;
        let mut permit = state
            .permit(workspace_id, commit.permit_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("permit '{}' does not exist", commit.permit_id))
            })?;
        commit.update.apply(&mut permit, commit.expected_status)?;

        state.permits.insert(permit.id, permit.clone());
        if let Some(event) = commit.approval_event {
            state.approvals.push((workspace_id, event));
        }
        if let Some(task) = commit.task {
            let task_id = task.id;
            upsert(&mut state.tasks, workspace_id, task, |stored| stored.id == task_id);
        }
        state.audit_events.push(commit.audit_event);

        Ok(permit)
    }

    async fn commit_approval(
        &self,
        workspace_id: WorkspaceId,
        commit: ApprovalCommit,
    ) -> AppResult<ApprovalCommitted> {
        let mut state = self.state.write().await;
        let mut permit = state
            .permit(workspace_id, commit.permit_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("permit '{}' does not exist", commit.permit_id))
            })?;
        if permit.status != ApprovalCommit::EXPECTED_STATUS {
            return Err(AppError::Conflict(format!(
                "permit '{}' is {} and no longer accepts approvals",
                permit.id, permit.status
            )));
        }

        let recorded = scoped(&state.approvals, workspace_id, |event| {
            event.permit_id == permit.id
        });
        let resolution = commit.resolve(&permit, &recorded);
        if let Some(update) = &resolution.update {
            update.apply(&mut permit, ApprovalCommit::EXPECTED_STATUS)?;
            state.permits.insert(permit.id, permit.clone());
        }
        state.approvals.push((workspace_id, commit.event));
        state.audit_events.push(resolution.audit_event);

        Ok(ApprovalCommitted {
            permit,
            progress: resolution.progress,
        })
    }

    async fn save_checklist_item(
        &self,
        workspace_id: WorkspaceId,
        item: ChecklistItem,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.open_permit(workspace_id, item.permit_id)?;

        state.activation_blocked.remove(&item.permit_id);
        let item_id = item.id;
        upsert(&mut state.checklist_items, workspace_id, item, |stored| {
            stored.id == item_id
        });
        state.audit_events.push(audit_event);
        Ok(())
    }

    async fn save_task(
        &self,
        workspace_id: WorkspaceId,
        task: PermitTask,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.open_permit(workspace_id, task.permit_id)?;

        let task_id = task.id;
        upsert(&mut state.tasks, workspace_id, task, |stored| stored.id == task_id);
        state.audit_events.push(audit_event);
        Ok(())
    }
}
