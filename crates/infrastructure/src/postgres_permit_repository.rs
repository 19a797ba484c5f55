use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use ptw_application::{
    ApprovalCommit, ApprovalCommitted, AuditEvent, PermitRepository, StatusChangeCommit,
};
use ptw_core::{AppError, AppResult, WorkspaceId};
use ptw_domain::{ApprovalEvent, ChecklistItem, Permit, PermitId, PermitStatus, PermitTask};

use crate::postgres_audit_repository::insert_audit_event;

mod commits;
mod items;
mod reads;
mod rows;

use rows::{ApprovalEventRow, ChecklistItemRow, PermitRow, PermitTaskRow};

const PERMIT_COLUMNS: &str = r#"
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
"#;

/// PostgreSQL-backed permit repository.
///
/// Commits lock the permit row with `FOR UPDATE` and write the permit, its
/// related rows and the audit row in one transaction.
#[derive(Clone)]
pub struct PostgresPermitRepository {
    pool: PgPool,
}

impl PostgresPermitRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self, purpose: &str) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start {purpose} transaction: {error}"))
        })
    }
}

async fn commit_transaction(
    transaction: Transaction<'static, Postgres>,
    purpose: &str,
) -> AppResult<()> {
    transaction.commit().await.map_err(|error| {
        AppError::Internal(format!("failed to commit {purpose} transaction: {error}"))
    })
}

/// Loads and locks a permit row inside a transaction.
async fn lock_permit(
    connection: &mut PgConnection,
    workspace_id: WorkspaceId,
    permit_id: PermitId,
) -> AppResult<Permit> {
    let row = sqlx::query_as::<_, PermitRow>(&format!(
        r#"
        SELECT {PERMIT_COLUMNS}
        FROM permits
        WHERE workspace_id = $1 AND id = $2
        FOR UPDATE
        "#
    ))
    .bind(workspace_id.as_uuid())
    .bind(permit_id.as_uuid())
    .fetch_optional(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock permit '{permit_id}': {error}")))?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "permit '{permit_id}' does not exist in workspace '{workspace_id}'"
        ))
    })?;

    Permit::try_from(row)
}

#[async_trait]
impl PermitRepository for PostgresPermitRepository {
    async fn insert_permit(&self, permit: Permit, audit_event: AuditEvent) -> AppResult<()> {
        self.insert_permit_impl(permit, audit_event).await
    }

    async fn find_permit(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Option<Permit>> {
        self.find_permit_impl(workspace_id, permit_id).await
    }

    async fn list_approval_events(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ApprovalEvent>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire permit connection: {error}"))
        })?;
        reads::approval_events(&mut connection, workspace_id, permit_id).await
    }

    async fn list_checklist_items(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ChecklistItem>> {
        self.list_checklist_items_impl(workspace_id, permit_id).await
    }

    async fn list_tasks(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<PermitTask>> {
        self.list_tasks_impl(workspace_id, permit_id).await
    }

    async fn list_permits_due_for_activation(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        self.list_permits_due_for_activation_impl(workspace_id, now, limit)
            .await
    }

    async fn mark_activation_blocked(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
        blocked_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.mark_activation_blocked_impl(workspace_id, permit_id, blocked_at)
            .await
    }

    async fn list_permits_past_end(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        self.list_permits_past_end_impl(workspace_id, now, limit)
            .await
    }

    async fn commit_status_change(
        &self,
        workspace_id: WorkspaceId,
        commit: StatusChangeCommit,
    ) -> AppResult<Permit> {
        self.commit_status_change_impl(workspace_id, commit).await
    }

    async fn commit_approval(
        &self,
        workspace_id: WorkspaceId,
        commit: ApprovalCommit,
    ) -> AppResult<ApprovalCommitted> {
        self.commit_approval_impl(workspace_id, commit).await
    }

    async fn save_checklist_item(
        &self,
        workspace_id: WorkspaceId,
        item: ChecklistItem,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        self.save_checklist_item_impl(workspace_id, item, audit_event)
            .await
    }

    async fn save_task(
        &self,
        workspace_id: WorkspaceId,
        task: PermitTask,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        self.save_task_impl(workspace_id, task, audit_event).await
    }
}
