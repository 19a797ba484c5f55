//! PostgreSQL fixed-window counters in the `rate_limits` table.
//!
//! Windows are aligned to multiples of their duration since the epoch, so
//! every replica agrees on the window start without coordination.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, PgPool};

use ptw_application::{AttemptInfo, RateLimitRepository};
use ptw_core::{AppError, AppResult};

/// PostgreSQL implementation of the rate limit counter store.
#[derive(Clone)]
pub struct PostgresRateLimitRepository {
    pool: PgPool,
}

impl PostgresRateLimitRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CounterRow {
    attempt_count: i32,
    window_started_at: DateTime<Utc>,
}

fn aligned_window_start(now: DateTime<Utc>, window_seconds: i64) -> AppResult<DateTime<Utc>> {
    let epoch = now.timestamp();
    let start = epoch - epoch.rem_euclid(window_seconds);
    Utc.timestamp_opt(start, 0)
        .single()
        .ok_or_else(|| AppError::Internal(format!("invalid rate limit window start: {start}")))
}

#[async_trait]
impl RateLimitRepository for PostgresRateLimitRepository {
    async fn record_attempt(
        &self,
        key: &str,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        if window_duration_seconds <= 0 {
            return Err(AppError::Validation(
                "window_duration_seconds must be greater than zero".to_owned(),
            ));
        }

        let window_start = aligned_window_start(Utc::now(), window_duration_seconds)?;

        // A row from an older window restarts at one.
        let row = sqlx::query_as::<_, CounterRow>(
            r#"
            INSERT INTO rate_limits (key, window_started_at, attempt_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (key) DO UPDATE
            SET attempt_count = CASE
                    WHEN rate_limits.window_started_at < EXCLUDED.window_started_at THEN 1
                    ELSE rate_limits.attempt_count + 1
                END,
                window_started_at = GREATEST(rate_limits.window_started_at, EXCLUDED.window_started_at)
            RETURNING attempt_count, window_started_at
            "#,
        )
        .bind(key)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record rate limit attempt for '{key}': {error}"))
        })?;

        Ok(AttemptInfo {
            attempt_count: row.attempt_count,
            window_started_at: row.window_started_at,
        })
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE window_started_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to clean up expired rate limits: {error}"))
            })?;

        Ok(result.rows_affected())
    }
}
