/// Configuration for a rate limit rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Category prefixed to every key (e.g. "permit_action", "trigger").
    pub category: String,
    /// Maximum number of attempts allowed in the window.
    pub max_attempts: i32,
    /// Window duration in seconds.
    pub window_seconds: i64,
}

impl RateLimitRule {
    /// Creates a new rate limit rule.
    #[must_use]
    pub fn new(category: impl Into<String>, max_attempts: i32, window_seconds: i64) -> Self {
        Self {
            category: category.into(),
            max_attempts,
            window_seconds,
        }
    }

    /// Permit mutations: 120 per minute per actor.
    #[must_use]
    pub fn permit_actions() -> Self {
        Self::new("permit_action", 120, 60)
    }

    /// Periodic trigger endpoints: 20 per minute per client IP.
    #[must_use]
    pub fn trigger_endpoints() -> Self {
        Self::new("trigger", 20, 60)
    }
}
