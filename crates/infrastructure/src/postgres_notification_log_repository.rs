use async_trait::async_trait;
use sqlx::PgPool;

use ptw_application::{NotificationLogRepository, NotificationRecord};
use ptw_core::{AppError, AppResult};

/// PostgreSQL-backed notification outcome log.
#[derive(Clone)]
pub struct PostgresNotificationLogRepository {
    pool: PgPool,
}

impl PostgresNotificationLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationLogRepository for PostgresNotificationLogRepository {
    async fn record_notification(&self, record: NotificationRecord) -> AppResult<()> {
        let recipient_count = i32::try_from(record.recipient_count)
            .map_err(|error| AppError::Internal(format!("invalid recipient count: {error}")))?;
        let attempts = i32::try_from(record.attempts)
            .map_err(|error| AppError::Internal(format!("invalid attempt count: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO notification_log (
                workspace_id,
                kind,
                permit_id,
                recipient_count,
                delivered,
                error,
                attempts,
                recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.workspace_id.as_uuid())
        .bind(record.kind.as_str())
        .bind(record.permit_id.map(|permit_id| permit_id.as_uuid()))
        .bind(recipient_count)
        .bind(record.delivered)
        .bind(record.error)
        .bind(attempts)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record notification outcome: {error}"))
        })?;

        Ok(())
    }
}
