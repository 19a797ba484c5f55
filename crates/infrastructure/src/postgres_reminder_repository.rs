use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use ptw_application::{ReminderDelivery, ReminderRepository};
use ptw_core::{AppError, AppResult, WorkspaceId};
use ptw_domain::ReminderSettings;

/// PostgreSQL-backed reminder settings and delivery ledger.
#[derive(Clone)]
pub struct PostgresReminderRepository {
    pool: PgPool,
}

impl PostgresReminderRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ReminderSettingsRow {
    digest_enabled: bool,
    windows_days: Vec<i32>,
}

#[async_trait]
impl ReminderRepository for PostgresReminderRepository {
    async fn find_settings(&self, workspace_id: WorkspaceId) -> AppResult<Option<ReminderSettings>> {
        let Some(row) = sqlx::query_as::<_, ReminderSettingsRow>(
            r#"
            SELECT digest_enabled, windows_days
            FROM reminder_settings
            WHERE workspace_id = $1
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load reminder settings for workspace '{workspace_id}': {error}"
            ))
        })?
        else {
            return Ok(None);
        };

        let windows_days = row
            .windows_days
            .into_iter()
            .map(|days| {
                u32::try_from(days).map_err(|error| {
                    AppError::Internal(format!("invalid reminder window '{days}': {error}"))
                })
            })
            .collect::<AppResult<Vec<u32>>>()?;

        ReminderSettings::new(row.digest_enabled, windows_days).map(Some)
    }

    async fn claim_delivery(
        &self,
        workspace_id: WorkspaceId,
        delivery: ReminderDelivery,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reminder_deliveries (delivery_key, workspace_id, recipient, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (delivery_key) DO NOTHING
            "#,
        )
        .bind(delivery.delivery_key.as_str())
        .bind(workspace_id.as_uuid())
        .bind(delivery.recipient.as_str())
        .bind(&delivery.payload)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to claim reminder delivery '{}': {error}",
                delivery.delivery_key
            ))
        })?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests;
