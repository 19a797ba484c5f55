use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use ptw_application::{AuditEvent, AuditRepository};
use ptw_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire audit connection: {error}"))
        })?;

        insert_audit_event(&mut connection, &event).await
    }
}

/// Inserts one audit row on an existing connection or transaction.
pub(crate) async fn insert_audit_event(
    connection: &mut PgConnection,
    event: &AuditEvent,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_events (
            workspace_id,
            actor,
            action,
            object_type,
            object_id,
            payload
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(event.workspace_id.as_uuid())
    .bind(event.actor.as_str())
    .bind(event.action.as_str())
    .bind(event.object_type.as_str())
    .bind(event.object_id.as_str())
    .bind(&event.payload)
    .execute(connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to append audit event '{}': {error}",
            event.action.as_str()
        ))
    })?;

    Ok(())
}
