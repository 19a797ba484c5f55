use std::time::Duration;

use crate::notification_ports::EmailMessage;

use super::NotificationDispatcher;

/// Linear backoff policy for bulk sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up; at least one attempt is always made.
    pub max_attempts: u32,
    /// Delay before the second attempt; attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Outcome of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Whether the provider accepted the message.
    pub delivered: bool,
    /// Attempts made.
    pub attempts: u32,
    /// Last error when not delivered.
    pub error: Option<String>,
}

impl DeliveryReport {
    pub(super) fn delivered(attempts: u32) -> Self {
        Self {
            delivered: true,
            attempts,
            error: None,
        }
    }

    pub(super) fn failed(attempts: u32, error: String) -> Self {
        Self {
            delivered: false,
            attempts,
            error: Some(error),
        }
    }
}

impl NotificationDispatcher {
    /// Sends `message`, retrying failures with linear backoff.
    pub async fn send_with_retry(&self, message: &EmailMessage) -> DeliveryReport {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut last_error = String::from("unknown");

        for attempt in 1..=max_attempts {
            match self.email_service.send_email(message).await {
                Ok(()) => return DeliveryReport::delivered(attempt),
                Err(error) => last_error = error.to_string(),
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.retry_policy.base_delay * attempt).await;
            }
        }

        DeliveryReport::failed(max_attempts, last_error)
    }
}
