//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_email_service;
mod in_memory_workspace_store;
mod postgres_audit_repository;
mod postgres_credential_repository;
mod postgres_notification_log_repository;
mod postgres_permit_repository;
mod postgres_rate_limit_repository;
mod postgres_reminder_repository;
mod postgres_template_repository;
mod postgres_workspace_directory;
mod redis_rate_limit_repository;
mod smtp_email_service;

#[cfg(test)]
mod postgres_test_support;

pub use console_email_service::ConsoleEmailService;
pub use in_memory_workspace_store::InMemoryWorkspaceStore;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_credential_repository::PostgresCredentialRepository;
pub use postgres_notification_log_repository::PostgresNotificationLogRepository;
pub use postgres_permit_repository::PostgresPermitRepository;
pub use postgres_rate_limit_repository::PostgresRateLimitRepository;
pub use postgres_reminder_repository::PostgresReminderRepository;
pub use postgres_template_repository::PostgresTemplateRepository;
pub use postgres_workspace_directory::PostgresWorkspaceDirectory;
pub use redis_rate_limit_repository::RedisRateLimitRepository;
pub use smtp_email_service::{SmtpEmailConfig, SmtpEmailService};
