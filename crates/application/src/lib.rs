//! Application services and ports.

#![forbid(unsafe_code)]

mod credential_service;
mod notification_dispatcher;
mod notification_ports;
mod permit_ports;
mod permit_workflow_service;
mod rate_limit_service;
mod scheduled_job_service;
mod template_service;

#[cfg(test)]
mod test_support;

pub use credential_service::{
    ContractorCredentials, CredentialService, RecordQualificationInput, RecordTrainingInput,
};
pub use notification_dispatcher::{
    DeliveryReport, DispatchMode, MAX_RECIPIENTS, NotificationDispatcher, RetryPolicy,
};
pub use notification_ports::{
    EmailMessage, EmailService, NotificationKind, NotificationLogRepository, NotificationRecord,
    WorkspaceDirectory, WorkspaceSummary,
};
pub use permit_ports::{
    ApprovalCommit, ApprovalCommitted, ApprovalResolution, AuditEvent, AuditRepository, Clock,
    CredentialRepository, PermitRepository, StatusChangeCommit, SystemClock, TemplateRepository,
};
pub use permit_workflow_service::{
    CreatePermitInput, DecisionInput, DecisionOutcome, PermitDetail, PermitWorkflowService,
    SCHEDULER_ACTOR, TransitionInput, TransitionOutcome,
};
pub use rate_limit_service::{AttemptInfo, RateLimitRepository, RateLimitRule, RateLimitService};
pub use scheduled_job_service::{
    DigestResult, JobRunSummary, MAX_PERMITS_PER_RUN, ReminderDelivery, ReminderRepository,
    ScheduledJobService,
};
pub use template_service::{PublishTemplateInput, TemplateService};
