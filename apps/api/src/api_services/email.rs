//! Outbound mail: the provider behind `EmailService` and the dispatcher that
//! turns permit events into messages.

use std::sync::Arc;

use ptw_application::{
    EmailService, NotificationDispatcher, NotificationLogRepository, WorkspaceDirectory,
};
use ptw_core::AppError;
use ptw_infrastructure::{ConsoleEmailService, SmtpEmailConfig, SmtpEmailService};
use tracing::info;

use crate::api_config::{EmailProviderConfig, NotificationConfig, SmtpRuntimeConfig};

pub(super) fn build_email_service(
    provider: &EmailProviderConfig,
) -> Result<Arc<dyn EmailService>, AppError> {
    let service: Arc<dyn EmailService> = match provider {
        EmailProviderConfig::Console => {
            info!("email provider: console");
            Arc::new(ConsoleEmailService::new())
        }
        EmailProviderConfig::Smtp(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "email provider: smtp");
            Arc::new(SmtpEmailService::new(smtp_email_config(smtp))?)
        }
    };

    Ok(service)
}

/// Wires the dispatcher with the configured mode, link base, and retry policy.
pub(super) fn build_notification_dispatcher(
    directory: Arc<dyn WorkspaceDirectory>,
    email: Arc<dyn EmailService>,
    notification_log: Arc<dyn NotificationLogRepository>,
    config: &NotificationConfig,
) -> NotificationDispatcher {
    NotificationDispatcher::new(directory, email, notification_log)
        .with_mode(config.dispatch_mode)
        .with_app_base_url(config.app_base_url.as_str())
        .with_retry_policy(config.retry_policy)
}

fn smtp_email_config(smtp: &SmtpRuntimeConfig) -> SmtpEmailConfig {
    SmtpEmailConfig {
        host: smtp.host.clone(),
        port: smtp.port,
        username: smtp.username.clone(),
        password: smtp.password.clone(),
        from_address: smtp.from_address.clone(),
    }
}
