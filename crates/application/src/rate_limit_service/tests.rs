use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use ptw_core::{AppError, AppResult};

use super::{AttemptInfo, RateLimitRepository, RateLimitRule, RateLimitService};

#[derive(Default)]
struct FakeRateLimitRepository {
    counters: Mutex<HashMap<String, i32>>,
}

#[async_trait]
impl RateLimitRepository for FakeRateLimitRepository {
    async fn record_attempt(
        &self,
        key: &str,
        _window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        let mut counters = self.counters.lock().await;
        let count = counters.entry(key.to_owned()).or_insert(0);
        *count += 1;
        Ok(AttemptInfo {
            attempt_count: *count,
            window_started_at: Utc::now(),
        })
    }

    async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        let mut counters = self.counters.lock().await;
        let removed = counters.len() as u64;
        counters.clear();
        Ok(removed)
    }
}

#[tokio::test]
async fn rejects_the_attempt_after_the_maximum() {
    let service = RateLimitService::new(Arc::new(FakeRateLimitRepository::default()));
    let rule = RateLimitRule::new("trigger", 2, 60);

    assert!(service.check_rate_limit(&rule, "10.0.0.1").await.is_ok());
    assert!(service.check_rate_limit(&rule, "10.0.0.1").await.is_ok());
    let third = service.check_rate_limit(&rule, "10.0.0.1").await;
    assert!(matches!(third, Err(AppError::RateLimited(_))));
}

#[tokio::test]
async fn keys_and_categories_are_counted_separately() {
    let service = RateLimitService::new(Arc::new(FakeRateLimitRepository::default()));
    let trigger = RateLimitRule::new("trigger", 1, 60);
    let permit = RateLimitRule::new("permit_action", 1, 60);

    assert!(service.check_rate_limit(&trigger, "a").await.is_ok());
    assert!(service.check_rate_limit(&trigger, "b").await.is_ok());
    assert!(service.check_rate_limit(&permit, "a").await.is_ok());
    assert!(service.check_rate_limit(&trigger, "a").await.is_err());
}

#[tokio::test]
async fn cleanup_resets_counters() {
    let service = RateLimitService::new(Arc::new(FakeRateLimitRepository::default()));
    let rule = RateLimitRule::new("trigger", 1, 60);

    assert!(service.check_rate_limit(&rule, "a").await.is_ok());
    assert_eq!(service.cleanup(Utc::now()).await.unwrap_or_default(), 1);
    assert!(service.check_rate_limit(&rule, "a").await.is_ok());
}

#[test]
fn built_in_rules_match_the_documented_limits() {
    assert_eq!(RateLimitRule::permit_actions().max_attempts, 120);
    assert_eq!(RateLimitRule::trigger_endpoints().max_attempts, 20);
    assert_eq!(RateLimitRule::trigger_endpoints().window_seconds, 60);
}
