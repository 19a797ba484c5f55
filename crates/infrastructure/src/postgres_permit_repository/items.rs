use super::commits::upsert_task;
use super::*;

fn ensure_open(permit: &Permit) -> AppResult<()> {
    if permit.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "permit '{}' is {} and can no longer change",
            permit.id, permit.status
        )));
    }

    Ok(())
}

impl PostgresPermitRepository {
    pub(super) async fn save_checklist_item_impl(
        &self,
        workspace_id: WorkspaceId,
        item: ChecklistItem,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut transaction = self.begin("checklist item").await?;
        let permit = lock_permit(&mut transaction, workspace_id, item.permit_id).await?;
        ensure_open(&permit)?;

        sqlx::query(
            r#"
            INSERT INTO permit_checklist_items (
                id,
                workspace_id,
                permit_id,
                label,
                required,
                checked,
                checked_by,
                checked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET
                label = EXCLUDED.label,
                required = EXCLUDED.required,
                checked = EXCLUDED.checked,
                checked_by = EXCLUDED.checked_by,
                checked_at = EXCLUDED.checked_at
            WHERE permit_checklist_items.workspace_id = EXCLUDED.workspace_id
            "#,
        )
        .bind(item.id)
        .bind(workspace_id.as_uuid())
        .bind(item.permit_id.as_uuid())
        .bind(item.label.as_str())
        .bind(item.required)
        .bind(item.checked)
        .bind(item.checked_by.as_deref())
        .bind(item.checked_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save checklist item '{}': {error}", item.id))
        })?;

        sqlx::query(
            "UPDATE permits SET activation_blocked_at = NULL WHERE workspace_id = $1 AND id = $2",
        )
        .bind(workspace_id.as_uuid())
        .bind(item.permit_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to clear activation block on permit '{}': {error}",
                item.permit_id
            ))
        })?;

        insert_audit_event(&mut transaction, &audit_event).await?;
        commit_transaction(transaction, "checklist item").await
    }

    pub(super) async fn mark_activation_blocked_impl(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
        blocked_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE permits
            SET activation_blocked_at = $3
            WHERE workspace_id = $1 AND id = $2 AND status = 'approved'
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(permit_id.as_uuid())
        .bind(blocked_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark activation block on permit '{permit_id}': {error}"
            ))
        })?;

        Ok(())
    }

    pub(super) async fn save_task_impl(
        &self,
        workspace_id: WorkspaceId,
        task: PermitTask,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut transaction = self.begin("permit task").await?;
        let permit = lock_permit(&mut transaction, workspace_id, task.permit_id).await?;
        ensure_open(&permit)?;

        upsert_task(&mut transaction, workspace_id, &task).await?;
        insert_audit_event(&mut transaction, &audit_event).await?;
        commit_transaction(transaction, "permit task").await
    }
}
