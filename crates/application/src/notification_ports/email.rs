use async_trait::async_trait;
use ptw_core::AppResult;

/// Outbound email with HTML and plain-text renditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
    /// Plain-text body.
    pub text_body: String,
}

/// Port for sending transactional emails.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends one message to every recipient.
    async fn send_email(&self, message: &EmailMessage) -> AppResult<()>;
}
