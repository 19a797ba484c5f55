use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ptw_core::AppResult;

/// Counter store behind the rate limiter, shared by every service instance.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Counts one attempt for `key` in its current fixed window.
    ///
    /// Windows last `window_duration_seconds`; an attempt outside the stored
    /// window starts a new one. Returns the count including this attempt.
    async fn record_attempt(
        &self,
        key: &str,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo>;

    /// Removes windows that started before the cutoff.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// State of the current window for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptInfo {
    /// Attempts in the current window, including this one.
    pub attempt_count: i32,
    /// When the current window started.
    pub window_started_at: DateTime<Utc>,
}
