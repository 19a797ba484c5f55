use super::*;

/// Lists decisions in insertion order on an existing connection.
pub(super) async fn approval_events(
    connection: &mut PgConnection,
    workspace_id: WorkspaceId,
    permit_id: PermitId,
) -> AppResult<Vec<ApprovalEvent>> {
    let rows = sqlx::query_as::<_, ApprovalEventRow>(
        r#"
        SELECT permit_id, actor_id, actor_role, decision, mode, comment, decided_at
        FROM permit_approvals
        WHERE workspace_id = $1 AND permit_id = $2
        ORDER BY id ASC
        "#,
    )
    .bind(workspace_id.as_uuid())
    .bind(permit_id.as_uuid())
    .fetch_all(connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to list approvals for permit '{permit_id}': {error}"
        ))
    })?;

    rows.into_iter().map(ApprovalEvent::try_from).collect()
}

impl PostgresPermitRepository {
    pub(super) async fn find_permit_impl(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Option<Permit>> {
        sqlx::query_as::<_, PermitRow>(&format!(
            r#"
            SELECT {PERMIT_COLUMNS}
            FROM permits
            WHERE workspace_id = $1 AND id = $2
            "#
        ))
        .bind(workspace_id.as_uuid())
        .bind(permit_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find permit '{permit_id}': {error}")))?
        .map(Permit::try_from)
        .transpose()
    }

    pub(super) async fn list_checklist_items_impl(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ChecklistItem>> {
        let rows = sqlx::query_as::<_, ChecklistItemRow>(
            r#"
            SELECT id, permit_id, label, required, checked, checked_by, checked_at
            FROM permit_checklist_items
            WHERE workspace_id = $1 AND permit_id = $2
            ORDER BY seq ASC
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(permit_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list checklist items for permit '{permit_id}': {error}"
            ))
        })?;

        Ok(rows.into_iter().map(ChecklistItem::from).collect())
    }

    pub(super) async fn list_tasks_impl(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<PermitTask>> {
        let rows = sqlx::query_as::<_, PermitTaskRow>(
            r#"
            SELECT id, permit_id, title, status, due_at, assignee, completed_at
            FROM permit_tasks
            WHERE workspace_id = $1 AND permit_id = $2
            ORDER BY seq ASC
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(permit_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list tasks for permit '{permit_id}': {error}"
            ))
        })?;

        rows.into_iter().map(PermitTask::try_from).collect()
    }

    pub(super) async fn list_permits_due_for_activation_impl(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        self.list_permits_where(
            workspace_id,
            "status = 'approved' AND activation_blocked_at IS NULL \
             AND start_at IS NOT NULL AND start_at <= $2",
            "start_at",
            now,
            limit,
        )
        .await
    }

    pub(super) async fn list_permits_past_end_impl(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        self.list_permits_where(
            workspace_id,
            "status IN ('approved', 'active') AND end_at IS NOT NULL AND end_at < $2",
            "end_at",
            now,
            limit,
        )
        .await
    }

    async fn list_permits_where(
        &self,
        workspace_id: WorkspaceId,
        condition: &str,
        order_column: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        let limit = i64::try_from(limit)
            .map_err(|error| AppError::Validation(format!("invalid permit batch limit: {error}")))?;

        let rows = sqlx::query_as::<_, PermitRow>(&format!(
            r#"
            SELECT {PERMIT_COLUMNS}
            FROM permits
            WHERE workspace_id = $1 AND {condition}
            ORDER BY {order_column} ASC
            LIMIT $3
            "#
        ))
        .bind(workspace_id.as_uuid())
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list permits for workspace '{workspace_id}': {error}"
            ))
        })?;

        rows.into_iter().map(Permit::try_from).collect()
    }
}
