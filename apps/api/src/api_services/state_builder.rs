use std::sync::Arc;

use ptw_application::{
    AuditRepository, CredentialRepository, CredentialService, EmailService,
    NotificationLogRepository, PermitRepository, PermitWorkflowService, RateLimitRepository,
    RateLimitService, ReminderRepository, ScheduledJobService, TemplateRepository,
    TemplateService, WorkspaceDirectory,
};
use ptw_core::AppError;
use ptw_infrastructure::{
    PostgresAuditRepository, PostgresCredentialRepository, PostgresNotificationLogRepository,
    PostgresPermitRepository, PostgresReminderRepository, PostgresTemplateRepository,
    PostgresWorkspaceDirectory,
};
use sqlx::PgPool;

use crate::api_config::{ApiConfig, NotificationConfig};
use crate::state::AppState;

use super::email::{build_email_service, build_notification_dispatcher};
use super::rate_limits::build_rate_limit_repository;

/// Every port the services need, independent of the backing store.
pub struct WorkspacePorts {
    pub permits: Arc<dyn PermitRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub directory: Arc<dyn WorkspaceDirectory>,
    pub notification_log: Arc<dyn NotificationLogRepository>,
    pub reminders: Arc<dyn ReminderRepository>,
    pub rate_limits: Arc<dyn RateLimitRepository>,
    pub email: Arc<dyn EmailService>,
}

/// Non-port inputs to the application state.
pub struct StateSettings {
    pub frontend_url: String,
    pub trigger_shared_secret: String,
    pub notifications: NotificationConfig,
}

pub async fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let ports = WorkspacePorts {
        permits: Arc::new(PostgresPermitRepository::new(pool.clone())),
        templates: Arc::new(PostgresTemplateRepository::new(pool.clone())),
        credentials: Arc::new(PostgresCredentialRepository::new(pool.clone())),
        audit: Arc::new(PostgresAuditRepository::new(pool.clone())),
        directory: Arc::new(PostgresWorkspaceDirectory::new(pool.clone())),
        notification_log: Arc::new(PostgresNotificationLogRepository::new(pool.clone())),
        reminders: Arc::new(PostgresReminderRepository::new(pool.clone())),
        rate_limits: build_rate_limit_repository(&pool, config).await?,
        email: build_email_service(&config.notifications.email_provider)?,
    };

    Ok(build_app_state_from_ports(
        ports,
        StateSettings {
            frontend_url: config.frontend_url.clone(),
            trigger_shared_secret: config.trigger_shared_secret.clone(),
            notifications: config.notifications.clone(),
        },
    ))
}

pub fn build_app_state_from_ports(ports: WorkspacePorts, settings: StateSettings) -> AppState {
    let notifications = build_notification_dispatcher(
        ports.directory.clone(),
        ports.email,
        ports.notification_log,
        &settings.notifications,
    );

    let workflow_service = PermitWorkflowService::new(
        ports.permits.clone(),
        ports.templates.clone(),
        ports.credentials.clone(),
        ports.audit.clone(),
        notifications.clone(),
    );

    let credential_service = CredentialService::new(ports.credentials.clone());
    let scheduled_job_service = ScheduledJobService::new(
        workflow_service.clone(),
        ports.permits,
        ports.credentials,
        ports.reminders,
        ports.audit,
        ports.directory,
        notifications,
    );

    AppState {
        workflow_service,
        template_service: TemplateService::new(ports.templates),
        credential_service,
        scheduled_job_service,
        rate_limit_service: RateLimitService::new(ports.rate_limits),
        frontend_url: settings.frontend_url,
        trigger_shared_secret: settings.trigger_shared_secret,
    }
}
