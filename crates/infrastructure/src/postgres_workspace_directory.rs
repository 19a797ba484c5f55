use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use ptw_application::{WorkspaceDirectory, WorkspaceSummary};
use ptw_core::{AppError, AppResult, WorkspaceId, WorkspaceRole};

/// PostgreSQL-backed directory of workspaces and member emails.
#[derive(Clone)]
pub struct PostgresWorkspaceDirectory {
    pool: PgPool,
}

impl PostgresWorkspaceDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct WorkspaceRow {
    id: Uuid,
    name: String,
}

impl From<WorkspaceRow> for WorkspaceSummary {
    fn from(row: WorkspaceRow) -> Self {
        Self {
            workspace_id: WorkspaceId::from_uuid(row.id),
            name: row.name,
        }
    }
}

#[async_trait]
impl WorkspaceDirectory for PostgresWorkspaceDirectory {
    async fn list_workspaces(&self) -> AppResult<Vec<WorkspaceSummary>> {
        let rows = sqlx::query_as::<_, WorkspaceRow>(
            r#"
            SELECT id, name
            FROM workspaces
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list workspaces: {error}")))?;

        Ok(rows.into_iter().map(WorkspaceSummary::from).collect())
    }

    async fn find_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Option<WorkspaceSummary>> {
        let row = sqlx::query_as::<_, WorkspaceRow>(
            r#"
            SELECT id, name
            FROM workspaces
            WHERE id = $1
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find workspace '{workspace_id}': {error}"))
        })?;

        Ok(row.map(WorkspaceSummary::from))
    }

    async fn list_member_emails(
        &self,
        workspace_id: WorkspaceId,
        roles: &[WorkspaceRole],
    ) -> AppResult<Vec<String>> {
        let roles: Vec<&str> = roles.iter().map(WorkspaceRole::as_str).collect();

        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT lower(email) AS email
            FROM workspace_members
            WHERE workspace_id = $1 AND role = ANY($2)
            ORDER BY email ASC
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(roles)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list member emails for workspace '{workspace_id}': {error}"
            ))
        })
    }
}

#[cfg(test)]
mod tests;
