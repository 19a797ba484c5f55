//! SMTP email service using the `lettre` crate.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use ptw_application::{EmailMessage, EmailService};
use ptw_core::{AppError, AppResult};

/// SMTP email service configuration.
#[derive(Clone)]
pub struct SmtpEmailConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// SMTP username.
    pub username: String,
    /// SMTP password.
    pub password: String,
    /// Sender email address.
    pub from_address: String,
}

/// Production email service using SMTP.
///
/// Recipients are placed on `Bcc` so role members never see each other's
/// addresses; the sender is the only visible `To`.
#[derive(Clone)]
pub struct SmtpEmailService {
    config: SmtpEmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailService {
    /// Creates a new SMTP email service.
    pub fn new(config: SmtpEmailConfig) -> AppResult<Self> {
        let credentials =
            Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|error| {
                AppError::Internal(format!("failed to create SMTP transport: {error}"))
            })?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self { config, mailer })
    }

    fn build_message(&self, message: &EmailMessage) -> AppResult<Message> {
        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|error| AppError::Internal(format!("invalid from address: {error}")))?;

        let mut builder = Message::builder()
            .from(from.clone())
            .to(from)
            .subject(message.subject.as_str());
        for recipient in &message.recipients {
            let mailbox: Mailbox = recipient.parse().map_err(|error| {
                AppError::Internal(format!("invalid recipient address '{recipient}': {error}"))
            })?;
            builder = builder.bcc(mailbox);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                message.text_body.clone(),
                message.html_body.clone(),
            ))
            .map_err(|error| AppError::Internal(format!("failed to build email: {error}")))
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_email(&self, message: &EmailMessage) -> AppResult<()> {
        if message.recipients.is_empty() {
            return Err(AppError::Validation(
                "email requires at least one recipient".to_owned(),
            ));
        }

        let email = self.build_message(message)?;
        self.mailer
            .send(email)
            .await
            .map_err(|error| AppError::Internal(format!("failed to send email: {error}")))?;

        Ok(())
    }
}
