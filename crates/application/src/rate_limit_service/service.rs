use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use ptw_core::{AppError, AppResult};

use super::config::RateLimitRule;
use super::ports::RateLimitRepository;

/// Application service for rate limiting.
#[derive(Clone)]
pub struct RateLimitService {
    repository: Arc<dyn RateLimitRepository>,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(repository: Arc<dyn RateLimitRepository>) -> Self {
        Self { repository }
    }

    /// Records an attempt for `key` under `rule`.
    ///
    /// `key` identifies the caller (actor id or client IP); the rule category
    /// is prefixed so rules never share counters.
    pub async fn check_rate_limit(&self, rule: &RateLimitRule, key: &str) -> AppResult<()> {
        let composite_key = format!("{}:{key}", rule.category);
        let info = self
            .repository
            .record_attempt(&composite_key, rule.window_seconds)
            .await?;

        if info.attempt_count > rule.max_attempts {
            let window_ends_at = info.window_started_at + Duration::seconds(rule.window_seconds);
            let retry_after = (window_ends_at - Utc::now()).num_seconds().max(1);
            debug!(
                category = rule.category.as_str(),
                attempts = info.attempt_count,
                "rate limit exceeded"
            );
            return Err(AppError::RateLimited(format!(
                "too many {} requests, retry in {retry_after}s",
                rule.category
            )));
        }

        Ok(())
    }

    /// Removes windows older than one day before `now`.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.repository
            .cleanup_expired(now - Duration::hours(24))
            .await
    }
}
