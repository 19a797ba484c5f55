use super::rows::metadata_json;
use super::*;

impl PostgresPermitRepository {
    pub(super) async fn insert_permit_impl(
        &self,
        permit: Permit,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let metadata = metadata_json(permit.id, &permit.metadata)?;
        let mut transaction = self.begin("permit insert").await?;

        sqlx::query(
            r#"
            INSERT INTO permits (
                id,
                workspace_id,
                title,
                status,
                metadata,
                start_at,
                end_at,
                template_id,
                template_version,
                source,
                created_by,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(permit.id.as_uuid())
        .bind(permit.workspace_id.as_uuid())
        .bind(permit.title.as_str())
        .bind(permit.status.as_str())
        .bind(metadata)
        .bind(permit.start_at)
        .bind(permit.end_at)
        .bind(permit.template.map(|reference| reference.template_id.as_uuid()))
        .bind(permit.template.map(|reference| reference.version))
        .bind(permit.source.as_str())
        .bind(permit.created_by.as_str())
        .bind(permit.created_at)
        .bind(permit.updated_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to insert permit '{}': {error}", permit.id))
        })?;

        insert_audit_event(&mut transaction, &audit_event).await?;
        commit_transaction(transaction, "permit insert").await
    }

    pub(super) async fn commit_status_change_impl(
        &self,
        workspace_id: WorkspaceId,
        commit: StatusChangeCommit,
    ) -> AppResult<Permit> {
        let mut transaction = self.begin("permit status change").await?;
        let mut permit = lock_permit(&mut transaction, workspace_id, commit.permit_id).await?;
        commit.update.apply(&mut permit, commit.expected_status)?;

        write_permit_status(&mut transaction, &permit).await?;
        if let Some(event) = &commit.approval_event {
            insert_approval_event(&mut transaction, workspace_id, event).await?;
        }
        if let Some(task) = &commit.task {
            upsert_task(&mut transaction, workspace_id, task).await?;
        }
        insert_audit_event(&mut transaction, &commit.audit_event).await?;

        commit_transaction(transaction, "permit status change").await?;
        Ok(permit)
    }

    pub(super) async fn commit_approval_impl(
        &self,
        workspace_id: WorkspaceId,
        commit: ApprovalCommit,
    ) -> AppResult<ApprovalCommitted> {
        let mut transaction = self.begin("permit approval").await?;
        let mut permit = lock_permit(&mut transaction, workspace_id, commit.permit_id).await?;
        if permit.status != ApprovalCommit::EXPECTED_STATUS {
            return Err(AppError::Conflict(format!(
                "permit '{}' is {} and no longer accepts approvals",
                permit.id, permit.status
            )));
        }

        let recorded = reads::approval_events(&mut transaction, workspace_id, permit.id).await?;
        let resolution = commit.resolve(&permit, &recorded);
        if let Some(update) = &resolution.update {
            update.apply(&mut permit, ApprovalCommit::EXPECTED_STATUS)?;
            write_permit_status(&mut transaction, &permit).await?;
        }
        insert_approval_event(&mut transaction, workspace_id, &commit.event).await?;
        insert_audit_event(&mut transaction, &resolution.audit_event).await?;

        commit_transaction(transaction, "permit approval").await?;
        Ok(ApprovalCommitted {
            permit,
            progress: resolution.progress,
        })
    }
}

async fn write_permit_status(connection: &mut PgConnection, permit: &Permit) -> AppResult<()> {
    let metadata = metadata_json(permit.id, &permit.metadata)?;
    sqlx::query(
        r#"
        UPDATE permits
        SET status = $3, metadata = $4, end_at = $5, updated_at = $6
        WHERE workspace_id = $1 AND id = $2
        "#,
    )
    .bind(permit.workspace_id.as_uuid())
    .bind(permit.id.as_uuid())
    .bind(permit.status.as_str())
    .bind(metadata)
    .bind(permit.end_at)
    .bind(permit.updated_at)
    .execute(connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!("failed to update permit '{}': {error}", permit.id))
    })?;

    Ok(())
}

async fn insert_approval_event(
    connection: &mut PgConnection,
    workspace_id: WorkspaceId,
    event: &ApprovalEvent,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO permit_approvals (
            workspace_id,
            permit_id,
            actor_id,
            actor_role,
            decision,
            mode,
            comment,
            decided_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(workspace_id.as_uuid())
    .bind(event.permit_id.as_uuid())
    .bind(event.actor_id.as_str())
    .bind(event.actor_role.as_str())
    .bind(event.decision.as_str())
    .bind(event.mode.as_str())
    .bind(event.comment.as_str())
    .bind(event.decided_at)
    .execute(connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to record approval on permit '{}': {error}",
            event.permit_id
        ))
    })?;

    Ok(())
}

pub(super) async fn upsert_task(
    connection: &mut PgConnection,
    workspace_id: WorkspaceId,
    task: &PermitTask,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO permit_tasks (
            id,
            workspace_id,
            permit_id,
            title,
            status,
            due_at,
            assignee,
            completed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE
        SET
            title = EXCLUDED.title,
            status = EXCLUDED.status,
            due_at = EXCLUDED.due_at,
            assignee = EXCLUDED.assignee,
            completed_at = EXCLUDED.completed_at
        WHERE permit_tasks.workspace_id = EXCLUDED.workspace_id
        "#,
    )
    .bind(task.id)
    .bind(workspace_id.as_uuid())
    .bind(task.permit_id.as_uuid())
    .bind(task.title.as_str())
    .bind(task.status.as_str())
    .bind(task.due_at)
    .bind(task.assignee.as_deref())
    .bind(task.completed_at)
    .execute(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to save task '{}': {error}", task.id)))?;

    Ok(())
}
