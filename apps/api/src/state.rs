use ptw_application::{
    CredentialService, PermitWorkflowService, RateLimitService, ScheduledJobService,
    TemplateService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub workflow_service: PermitWorkflowService,
    pub template_service: TemplateService,
    pub credential_service: CredentialService,
    pub scheduled_job_service: ScheduledJobService,
    pub rate_limit_service: RateLimitService,
    pub frontend_url: String,
    pub trigger_shared_secret: String,
}
