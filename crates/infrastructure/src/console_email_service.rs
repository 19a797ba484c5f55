//! Development email service that writes messages to tracing output.

use async_trait::async_trait;
use ptw_application::{EmailMessage, EmailService};
use ptw_core::AppResult;
use tracing::info;

/// Logs every outbound message instead of sending it.
#[derive(Clone, Default)]
pub struct ConsoleEmailService;

impl ConsoleEmailService {
    /// Creates a new console email service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailService for ConsoleEmailService {
    async fn send_email(&self, message: &EmailMessage) -> AppResult<()> {
        info!(
            recipients = message.recipients.len(),
            subject = message.subject.as_str(),
            "--- EMAIL (console) ---\nTo: {}\nSubject: {}\n\n{}\n--- END EMAIL ---",
            message.recipients.join(", "),
            message.subject,
            message.text_body
        );

        Ok(())
    }
}
