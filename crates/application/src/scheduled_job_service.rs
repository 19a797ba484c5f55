//! Time-boundary jobs invoked by periodic external triggers.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use ptw_core::{AppError, AppResult, WorkspaceId};
use ptw_domain::{
    AuditAction, OWNERS_ADMINS_RECIPIENT_CLASS, Permit, PermitStatus, digest_delivery_key,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::notification_dispatcher::NotificationDispatcher;
use crate::notification_ports::{WorkspaceDirectory, WorkspaceSummary};
use crate::permit_ports::{AuditEvent, AuditRepository, CredentialRepository, PermitRepository};
use crate::permit_workflow_service::{PermitWorkflowService, SCHEDULER_ACTOR};

mod ports;

pub use ports::{ReminderDelivery, ReminderRepository};

/// Upper bound on permits moved by one job run.
pub const MAX_PERMITS_PER_RUN: usize = 500;

/// Counts reported by a permit job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JobRunSummary {
    /// Permits moved to the target status.
    pub transitioned: usize,
    /// Permits left unchanged because admission failed.
    pub skipped: usize,
}

/// Per-workspace digest outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestResult {
    /// Workspace.
    pub workspace_id: WorkspaceId,
    /// Qualifications expiring within the widest window.
    pub expiring_count: u64,
    /// Whether this run claimed the delivery key.
    pub claimed: bool,
    /// Whether the email was accepted.
    pub delivered: bool,
}

/// Runs activation, expiry and digest jobs through the workflow service.
#[derive(Clone)]
pub struct ScheduledJobService {
    workflow_service: PermitWorkflowService,
    permit_repository: Arc<dyn PermitRepository>,
    credential_repository: Arc<dyn CredentialRepository>,
    reminder_repository: Arc<dyn ReminderRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    directory: Arc<dyn WorkspaceDirectory>,
    notifications: NotificationDispatcher,
}

impl ScheduledJobService {
    /// Creates a scheduled job service.
    #[must_use]
    pub fn new(
        workflow_service: PermitWorkflowService,
        permit_repository: Arc<dyn PermitRepository>,
        credential_repository: Arc<dyn CredentialRepository>,
        reminder_repository: Arc<dyn ReminderRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        directory: Arc<dyn WorkspaceDirectory>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            workflow_service,
            permit_repository,
            credential_repository,
            reminder_repository,
            audit_repository,
            directory,
            notifications,
        }
    }

    /// Activates approved permits whose start time has passed.
    pub async fn activate_due_permits(&self, now: DateTime<Utc>) -> AppResult<JobRunSummary> {
        let mut summary = JobRunSummary::default();
        for workspace in self.directory.list_workspaces().await? {
            let remaining = MAX_PERMITS_PER_RUN - summary.transitioned - summary.skipped;
            if remaining == 0 {
                break;
            }

            let permits = self
                .permit_repository
                .list_permits_due_for_activation(workspace.workspace_id, now, remaining)
                .await?;
            self.move_permits(permits, PermitStatus::Active, now, &mut summary)
                .await;
        }

        info!(
            activated = summary.transitioned,
            skipped = summary.skipped,
            "activation job finished"
        );
        Ok(summary)
    }

    /// Expires approved or active permits whose end time has passed.
    pub async fn expire_lapsed_permits(&self, now: DateTime<Utc>) -> AppResult<JobRunSummary> {
        let mut summary = JobRunSummary::default();
        for workspace in self.directory.list_workspaces().await? {
            let remaining = MAX_PERMITS_PER_RUN - summary.transitioned - summary.skipped;
            if remaining == 0 {
                break;
            }

            let permits = self
                .permit_repository
                .list_permits_past_end(workspace.workspace_id, now, remaining)
                .await?;
            self.move_permits(permits, PermitStatus::Expired, now, &mut summary)
                .await;
        }

        info!(
            expired = summary.transitioned,
            skipped = summary.skipped,
            "expiry job finished"
        );
        Ok(summary)
    }

    async fn move_permits(
        &self,
        permits: Vec<Permit>,
        next_status: PermitStatus,
        now: DateTime<Utc>,
        summary: &mut JobRunSummary,
    ) {
        for permit in permits {
            match self
                .workflow_service
                .trigger_transition(permit.workspace_id, permit.id, next_status)
                .await
            {
                Ok(_) => summary.transitioned += 1,
                Err(error) => {
                    summary.skipped += 1;
                    warn!(
                        workspace_id = %permit.workspace_id,
                        permit_id = %permit.id,
                        to = next_status.as_str(),
                        code = error.code(),
                        error = %error,
                        "scheduled transition skipped"
                    );
                    if next_status == PermitStatus::Active
                        && matches!(error, AppError::GateBlocked(_))
                    {
                        self.park_blocked_activation(&permit, now).await;
                    }
                }
            }
        }
    }

    /// Keeps a checklist-blocked permit out of later runs until its
    /// checklist changes, so the refusal is audited once.
    async fn park_blocked_activation(&self, permit: &Permit, now: DateTime<Utc>) {
        if let Err(error) = self
            .permit_repository
            .mark_activation_blocked(permit.workspace_id, permit.id, now)
            .await
        {
            warn!(
                permit_id = %permit.id,
                error = %error,
                "failed to mark permit as activation blocked"
            );
        }
    }

    /// Sends at most one expiry digest per workspace and day.
    pub async fn send_qualification_digests(&self, today: NaiveDate) -> AppResult<Vec<DigestResult>> {
        let mut results = Vec::new();
        for workspace in self.directory.list_workspaces().await? {
            match self.send_workspace_digest(&workspace, today).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(error) => warn!(
                    workspace_id = %workspace.workspace_id,
                    error = %error,
                    "qualification digest skipped"
                ),
            }
        }

        Ok(results)
    }

    async fn send_workspace_digest(
        &self,
        workspace: &WorkspaceSummary,
        today: NaiveDate,
    ) -> AppResult<Option<DigestResult>> {
        let workspace_id = workspace.workspace_id;
        let settings = self
            .reminder_repository
            .find_settings(workspace_id)
            .await?
            .unwrap_or_default();
        if !settings.digest_enabled {
            return Ok(None);
        }

        let expiring_count = self
            .credential_repository
            .count_qualifications_expiring(workspace_id, settings.horizon(today))
            .await?;
        if expiring_count == 0 {
            return Ok(Some(DigestResult {
                workspace_id,
                expiring_count,
                claimed: false,
                delivered: false,
            }));
        }

        let delivery_key = digest_delivery_key(workspace_id, today, OWNERS_ADMINS_RECIPIENT_CLASS);
        let claimed = self
            .reminder_repository
            .claim_delivery(
                workspace_id,
                ReminderDelivery {
                    delivery_key: delivery_key.clone(),
                    recipient: format!("workspace:{workspace_id}:{OWNERS_ADMINS_RECIPIENT_CLASS}"),
                    payload: json!({
                        "workspace": workspace.name,
                        "expiring_count": expiring_count,
                        "windows_days": settings.windows_days,
                    }),
                },
            )
            .await?;
        if !claimed {
            return Ok(Some(DigestResult {
                workspace_id,
                expiring_count,
                claimed: false,
                delivered: false,
            }));
        }

        let report = self
            .notifications
            .send_qualification_digest(workspace, expiring_count, &settings.windows_days)
            .await;
        if report.delivered {
            self.audit_repository
                .append_event(AuditEvent {
                    workspace_id,
                    actor: SCHEDULER_ACTOR.to_owned(),
                    action: AuditAction::ReminderDigestSent,
                    object_type: "reminder_delivery".to_owned(),
                    object_id: delivery_key,
                    payload: json!({
                        "expiring_count": expiring_count,
                        "attempts": report.attempts,
                    }),
                })
                .await?;
        }

        Ok(Some(DigestResult {
            workspace_id,
            expiring_count,
            claimed: true,
            delivered: report.delivered,
        }))
    }
}

#[cfg(test)]
mod tests;
