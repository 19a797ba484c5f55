//! Redis fixed-window counters shared across API replicas.
//!
//! Each window is its own key, `<prefix>:<key>:<window index>`, so a counter
//! never needs resetting: the key expires shortly after its window closes.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ptw_application::{AttemptInfo, RateLimitRepository};
use ptw_core::{AppError, AppResult};
use redis::aio::ConnectionManager;

/// Seconds a window key outlives its window.
const EXPIRY_GRACE_SECONDS: i64 = 5;

/// Redis counter store; stale windows disappear through key TTLs.
#[derive(Clone)]
pub struct RedisRateLimitRepository {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisRateLimitRepository {
    /// Connects to Redis and namespaces every key under `key_prefix`.
    pub async fn connect(client: redis::Client, key_prefix: impl Into<String>) -> AppResult<Self> {
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        Ok(Self {
            connection,
            key_prefix: key_prefix.into(),
        })
    }
}

/// Aligned window containing `now_epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowBucket {
    index: i64,
    started_epoch: i64,
}

impl WindowBucket {
    fn containing(now_epoch: i64, window_seconds: i64) -> Self {
        let index = now_epoch.div_euclid(window_seconds);
        Self {
            index,
            started_epoch: index * window_seconds,
        }
    }

    fn redis_key(&self, prefix: &str, key: &str) -> String {
        format!("{prefix}:{key}:{}", self.index)
    }
}

#[async_trait]
impl RateLimitRepository for RedisRateLimitRepository {
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

        let bucket = WindowBucket::containing(Utc::now().timestamp(), window_duration_seconds);
        let redis_key = bucket.redis_key(self.key_prefix.as_str(), key);
        let mut connection = self.connection.clone();

        let (attempt_count,): (i64,) = redis::pipe()
            .atomic()
            .incr(&redis_key, 1)
            .expire(&redis_key, window_duration_seconds + EXPIRY_GRACE_SECONDS)
            .ignore()
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to record rate limit attempt for '{key}': {error}"
                ))
            })?;

        let attempt_count = i32::try_from(attempt_count)
            .map_err(|error| AppError::Internal(format!("invalid redis attempt count: {error}")))?;
        let window_started_at = Utc
            .timestamp_opt(bucket.started_epoch, 0)
            .single()
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "invalid rate limit window start: {}",
                    bucket.started_epoch
                ))
            })?;

        Ok(AttemptInfo {
            attempt_count,
            window_started_at,
        })
    }

    async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        Ok(0)
    }
}
