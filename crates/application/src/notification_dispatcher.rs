use std::sync::Arc;

use chrono::Utc;
use ptw_core::{WorkspaceId, WorkspaceRole};
use ptw_domain::{ApprovalDecision, Permit, PermitId};
use tracing::{debug, warn};

use crate::notification_ports::{
    EmailMessage, EmailService, NotificationKind, NotificationLogRepository, NotificationRecord,
    WorkspaceDirectory, WorkspaceSummary,
};

mod content;
mod retry;

pub use retry::{DeliveryReport, RetryPolicy};

use content::{EmailContent, Notice, PermitBrief};

/// Upper bound on recipients resolved for one notification.
pub const MAX_RECIPIENTS: usize = 50;

const ISSUER_ROLES: &[WorkspaceRole] = &[
    WorkspaceRole::Issuer,
    WorkspaceRole::Admin,
    WorkspaceRole::Owner,
];
const DIGEST_ROLES: &[WorkspaceRole] = &[WorkspaceRole::Owner, WorkspaceRole::Admin];

/// Whether workflow notifications run on their own task or inside the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Spawn delivery on the runtime; callers never wait on email.
    #[default]
    Detached,
    /// Await delivery before returning.
    Inline,
}

impl DispatchMode {
    /// Parses a configuration value.
    pub fn parse(value: &str) -> ptw_core::AppResult<Self> {
        match value {
            "detached" => Ok(Self::Detached),
            "inline" => Ok(Self::Inline),
            _ => Err(ptw_core::AppError::Validation(format!(
                "unknown notification dispatch mode '{value}'"
            ))),
        }
    }
}

struct PendingNotification {
    workspace_id: WorkspaceId,
    kind: NotificationKind,
    permit_id: Option<PermitId>,
    roles: Vec<WorkspaceRole>,
    notice: Notice,
}

/// Best-effort email fan-out for workflow events and digests.
///
/// Failures are logged and recorded, never returned to the workflow.
#[derive(Clone)]
pub struct NotificationDispatcher {
    directory: Arc<dyn WorkspaceDirectory>,
    email_service: Arc<dyn EmailService>,
    notification_log: Arc<dyn NotificationLogRepository>,
    mode: DispatchMode,
    app_base_url: String,
    retry_policy: RetryPolicy,
}

impl NotificationDispatcher {
    /// Creates a dispatcher in detached mode.
    #[must_use]
    pub fn new(
        directory: Arc<dyn WorkspaceDirectory>,
        email_service: Arc<dyn EmailService>,
        notification_log: Arc<dyn NotificationLogRepository>,
    ) -> Self {
        Self {
            directory,
            email_service,
            notification_log,
            mode: DispatchMode::Detached,
            app_base_url: String::new(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Sets the dispatch mode.
    #[must_use]
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the base URL used for links in emails.
    #[must_use]
    pub fn with_app_base_url(mut self, app_base_url: impl Into<String>) -> Self {
        self.app_base_url = app_base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Sets the retry policy used for bulk sends.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Notifies the pending approver role plus admins and owners.
    pub async fn notify_permit_submitted(&self, permit: &Permit, next_role: Option<WorkspaceRole>) {
        let mut roles: Vec<WorkspaceRole> = next_role.into_iter().collect();
        for role in [WorkspaceRole::Admin, WorkspaceRole::Owner] {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        self.dispatch(PendingNotification {
            workspace_id: permit.workspace_id,
            kind: NotificationKind::PermitSubmitted,
            permit_id: Some(permit.id),
            roles,
            notice: Notice::Submitted {
                permit: PermitBrief::from(permit),
            },
        })
        .await;
    }

    /// Notifies holders of the next approval step.
    pub async fn notify_approval_pending(&self, permit: &Permit, next_role: WorkspaceRole) {
        self.dispatch(PendingNotification {
            workspace_id: permit.workspace_id,
            kind: NotificationKind::ApprovalStepPending,
            permit_id: Some(permit.id),
            roles: vec![next_role],
            notice: Notice::StepPending {
                permit: PermitBrief::from(permit),
                role: next_role,
            },
        })
        .await;
    }

    /// Notifies issuer roles about a decision.
    pub async fn notify_decision(&self, permit: &Permit, decision: ApprovalDecision, comment: &str) {
        self.dispatch(PendingNotification {
            workspace_id: permit.workspace_id,
            kind: NotificationKind::PermitDecision,
            permit_id: Some(permit.id),
            roles: ISSUER_ROLES.to_vec(),
            notice: Notice::Decision {
                permit: PermitBrief::from(permit),
                decision,
                comment: comment.to_owned(),
            },
        })
        .await;
    }

    /// Sends the expiry digest to owners and admins with retries.
    pub async fn send_qualification_digest(
        &self,
        workspace: &WorkspaceSummary,
        expiring_count: u64,
        windows_days: &[u32],
    ) -> DeliveryReport {
        let notice = Notice::Digest {
            expiring_count,
            windows_days: windows_days.to_vec(),
        };
        let recipients = match self.resolve_recipients(workspace.workspace_id, DIGEST_ROLES).await {
            Ok(recipients) => recipients,
            Err(report) => {
                self.record(
                    workspace.workspace_id,
                    NotificationKind::QualificationDigest,
                    None,
                    0,
                    &report,
                )
                .await;
                return report;
            }
        };

        let content = notice.render(&workspace.name, &self.app_base_url);
        let recipient_count = recipients.len();
        let report = self.send_with_retry(&content.into_message(recipients)).await;
        if !report.delivered {
            warn!(
                workspace_id = %workspace.workspace_id,
                attempts = report.attempts,
                error = report.error.as_deref().unwrap_or_default(),
                "qualification digest was not delivered"
            );
        }
        self.record(
            workspace.workspace_id,
            NotificationKind::QualificationDigest,
            None,
            recipient_count,
            &report,
        )
        .await;
        report
    }

    async fn dispatch(&self, pending: PendingNotification) {
        match self.mode {
            DispatchMode::Inline => {
                self.deliver(pending).await;
            }
            DispatchMode::Detached => {
                let dispatcher = self.clone();
                tokio::spawn(async move {
                    dispatcher.deliver(pending).await;
                });
            }
        }
    }

    async fn deliver(&self, pending: PendingNotification) -> DeliveryReport {
        let PendingNotification {
            workspace_id,
            kind,
            permit_id,
            roles,
            notice,
        } = pending;

        let recipients = match self.resolve_recipients(workspace_id, &roles).await {
            Ok(recipients) => recipients,
            Err(report) => {
                self.record(workspace_id, kind, permit_id, 0, &report).await;
                return report;
            }
        };

        let workspace_name = self.workspace_name(workspace_id).await;
        let content = notice.render(&workspace_name, &self.app_base_url);
        let recipient_count = recipients.len();
        let report = match self
            .email_service
            .send_email(&content.into_message(recipients))
            .await
        {
            Ok(()) => DeliveryReport::delivered(1),
            Err(error) => {
                warn!(
                    workspace_id = %workspace_id,
                    kind = kind.as_str(),
                    error = %error,
                    "workflow notification failed"
                );
                DeliveryReport::failed(1, error.to_string())
            }
        };

        self.record(workspace_id, kind, permit_id, recipient_count, &report)
            .await;
        report
    }

    /// Resolves deduplicated recipients, or a failed report when none exist.
    async fn resolve_recipients(
        &self,
        workspace_id: WorkspaceId,
        roles: &[WorkspaceRole],
    ) -> Result<Vec<String>, DeliveryReport> {
        let emails = match self.directory.list_member_emails(workspace_id, roles).await {
            Ok(emails) => emails,
            Err(error) => {
                warn!(workspace_id = %workspace_id, error = %error, "recipient lookup failed");
                return Err(DeliveryReport::failed(0, error.to_string()));
            }
        };

        let mut recipients: Vec<String> = Vec::new();
        for email in emails {
            let email = email.trim().to_ascii_lowercase();
            if email.is_empty() || recipients.contains(&email) {
                continue;
            }
            recipients.push(email);
            if recipients.len() == MAX_RECIPIENTS {
                break;
            }
        }

        if recipients.is_empty() {
            debug!(workspace_id = %workspace_id, "no notification recipients");
            return Err(DeliveryReport::failed(0, "no recipients".to_owned()));
        }

        Ok(recipients)
    }

    async fn workspace_name(&self, workspace_id: WorkspaceId) -> String {
        match self.directory.find_workspace(workspace_id).await {
            Ok(Some(workspace)) => workspace.name,
            Ok(None) => "your workspace".to_owned(),
            Err(error) => {
                warn!(workspace_id = %workspace_id, error = %error, "workspace lookup failed");
                "your workspace".to_owned()
            }
        }
    }

    async fn record(
        &self,
        workspace_id: WorkspaceId,
        kind: NotificationKind,
        permit_id: Option<PermitId>,
        recipient_count: usize,
        report: &DeliveryReport,
    ) {
        let record = NotificationRecord {
            workspace_id,
            kind,
            permit_id,
            recipient_count,
            delivered: report.delivered,
            error: report.error.clone(),
            attempts: report.attempts,
            recorded_at: Utc::now(),
        };

        if let Err(error) = self.notification_log.record_notification(record).await {
            warn!(workspace_id = %workspace_id, error = %error, "failed to record notification");
        }
    }
}

impl EmailContent {
    fn into_message(self, recipients: Vec<String>) -> EmailMessage {
        EmailMessage {
            recipients,
            subject: self.subject,
            html_body: self.html_body,
            text_body: self.text_body,
        }
    }
}

#[cfg(test)]
mod tests;
