use ptw_core::{AppError, AppResult, WorkspaceRole};
use serde::{Deserialize, Serialize};

use crate::permit::PermitStatus;

const ISSUERS: &[WorkspaceRole] = &[
    WorkspaceRole::Issuer,
    WorkspaceRole::Admin,
    WorkspaceRole::Owner,
];
const APPROVERS: &[WorkspaceRole] = &[
    WorkspaceRole::Approver,
    WorkspaceRole::Admin,
    WorkspaceRole::Owner,
];
const CHECKLIST_EDITORS: &[WorkspaceRole] = &[
    WorkspaceRole::Issuer,
    WorkspaceRole::Approver,
    WorkspaceRole::Admin,
    WorkspaceRole::Owner,
];
const ADMINISTRATORS: &[WorkspaceRole] = &[WorkspaceRole::Admin, WorkspaceRole::Owner];
const NOBODY: &[WorkspaceRole] = &[];

/// Interactive actions checked against the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum PermitAction {
    /// Create a draft permit.
    Create,
    /// Request a status transition to the given target.
    Transition(PermitStatus),
    /// Record an approval decision.
    Decide,
    /// Add or toggle checklist items.
    EditChecklist,
    /// Complete a permit task.
    CompleteTask,
    /// Publish a new template version.
    PublishTemplate,
    /// Record contractor qualifications and training completions.
    RecordCredential,
    /// Waive an expired contractor qualification.
    WaiveQualification,
}

impl PermitAction {
    /// Returns the roles permitted to perform the action.
    #[must_use]
    pub fn allowed_roles(&self) -> &'static [WorkspaceRole] {
        match self {
            Self::Create | Self::CompleteTask | Self::RecordCredential => ISSUERS,
            Self::Transition(target) => match target {
                PermitStatus::Submitted | PermitStatus::Closed | PermitStatus::Cancelled => {
                    ISSUERS
                }
                PermitStatus::Active | PermitStatus::NeedsChanges => APPROVERS,
                PermitStatus::Draft | PermitStatus::Approved | PermitStatus::Expired => NOBODY,
            },
            Self::Decide => APPROVERS,
            Self::EditChecklist => CHECKLIST_EDITORS,
            Self::PublishTemplate | Self::WaiveQualification => ADMINISTRATORS,
        }
    }

    /// Returns whether `role` may perform the action.
    #[must_use]
    pub fn is_allowed(&self, role: WorkspaceRole) -> bool {
        self.allowed_roles().contains(&role)
    }

    /// Fails with `forbidden` when `role` may not perform the action.
    pub fn authorize(&self, role: WorkspaceRole) -> AppResult<()> {
        if self.is_allowed(role) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "role '{role}' may not {}",
            self.describe()
        )))
    }

    fn describe(&self) -> String {
        match self {
            Self::Create => "create permits".to_owned(),
            Self::Transition(target) => format!("move permits to '{target}'"),
            Self::Decide => "record approval decisions".to_owned(),
            Self::EditChecklist => "edit permit checklists".to_owned(),
            Self::CompleteTask => "complete permit tasks".to_owned(),
            Self::PublishTemplate => "publish permit templates".to_owned(),
            Self::RecordCredential => "record contractor credentials".to_owned(),
            Self::WaiveQualification => "waive contractor qualifications".to_owned(),
        }
    }
}

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Draft permit created.
    PermitCreated,
    /// Permit submitted for approval.
    PermitSubmitted,
    /// Approval chain completed.
    PermitApproved,
    /// Work started.
    PermitActive,
    /// Work closed out.
    PermitClosed,
    /// Permit cancelled.
    PermitCancelled,
    /// Permit lapsed past its end.
    PermitExpired,
    /// Permit returned to the issuer.
    PermitNeedsChanges,
    /// Approver rejected the permit.
    PermitRejected,
    /// Intermediate approval recorded.
    PermitApprovalRecorded,
    /// Submission refused by a gate.
    PermitSubmitBlocked,
    /// Approval refused by a gate.
    PermitApproveBlocked,
    /// Activation refused by the checklist.
    PermitActivateBlocked,
    /// Status machine refused a transition.
    PermitTransitionRefused,
    /// Approval refused because another role holds the pending step.
    PermitApprovalStepRefused,
    /// Checklist item added.
    PermitChecklistItemAdded,
    /// Checklist item ticked or cleared.
    PermitChecklistItemToggled,
    /// Permit task completed.
    PermitTaskCompleted,
    /// Template version published.
    PermitTemplatePublished,
    /// Expiry digest sent.
    ReminderDigestSent,
    /// Contractor qualification recorded or renewed.
    QualificationRecorded,
    /// Contractor qualification expiry waived.
    QualificationWaived,
    /// Contractor training module completed.
    TrainingCompleted,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermitCreated => "permit.created",
            Self::PermitSubmitted => "permit.submitted",
            Self::PermitApproved => "permit.approved",
            Self::PermitActive => "permit.active",
            Self::PermitClosed => "permit.closed",
            Self::PermitCancelled => "permit.cancelled",
            Self::PermitExpired => "permit.expired",
            Self::PermitNeedsChanges => "permit.needs_changes",
            Self::PermitRejected => "permit.rejected",
            Self::PermitApprovalRecorded => "permit.approval_recorded",
            Self::PermitSubmitBlocked => "permit.submit_blocked",
            Self::PermitApproveBlocked => "permit.approve_blocked",
            Self::PermitActivateBlocked => "permit.activate_blocked",
            Self::PermitTransitionRefused => "permit.transition_refused",
            Self::PermitApprovalStepRefused => "permit.approval_step_refused",
            Self::PermitChecklistItemAdded => "permit.checklist_item_added",
            Self::PermitChecklistItemToggled => "permit.checklist_item_toggled",
            Self::PermitTaskCompleted => "permit.task_completed",
            Self::PermitTemplatePublished => "permit_template.published",
            Self::ReminderDigestSent => "reminder.digest_sent",
            Self::QualificationRecorded => "contractor_qualification.recorded",
            Self::QualificationWaived => "contractor_qualification.waived",
            Self::TrainingCompleted => "contractor_training.completed",
        }
    }

    /// Returns the `permit.<status>` action recorded when a permit enters `status`.
    #[must_use]
    pub fn for_status(status: PermitStatus) -> Option<Self> {
        match status {
            PermitStatus::Draft => None,
            PermitStatus::Submitted => Some(Self::PermitSubmitted),
            PermitStatus::NeedsChanges => Some(Self::PermitNeedsChanges),
            PermitStatus::Approved => Some(Self::PermitApproved),
            PermitStatus::Active => Some(Self::PermitActive),
            PermitStatus::Closed => Some(Self::PermitClosed),
            PermitStatus::Cancelled => Some(Self::PermitCancelled),
            PermitStatus::Expired => Some(Self::PermitExpired),
        }
    }
}

#[cfg(test)]
mod tests {
    use ptw_core::{AppError, WorkspaceRole};

    use super::{AuditAction, PermitAction};
    use crate::permit::PermitStatus;

    #[test]
    fn issuers_submit_and_approvers_activate() {
        let submit = PermitAction::Transition(PermitStatus::Submitted);
        assert!(submit.is_allowed(WorkspaceRole::Issuer));
        assert!(!submit.is_allowed(WorkspaceRole::Approver));

        let activate = PermitAction::Transition(PermitStatus::Active);
        assert!(activate.is_allowed(WorkspaceRole::Approver));
        assert!(!activate.is_allowed(WorkspaceRole::Issuer));
    }

    #[test]
    fn viewers_are_never_allowed() {
        let actions = [
            PermitAction::Create,
            PermitAction::Decide,
            PermitAction::EditChecklist,
            PermitAction::CompleteTask,
            PermitAction::PublishTemplate,
            PermitAction::RecordCredential,
            PermitAction::WaiveQualification,
        ];
        for action in actions {
            assert!(!action.is_allowed(WorkspaceRole::Viewer));
        }
        for status in PermitStatus::all() {
            assert!(!PermitAction::Transition(*status).is_allowed(WorkspaceRole::Viewer));
        }
    }

    #[test]
    fn approved_is_not_reachable_by_direct_transition() {
        for role in WorkspaceRole::all() {
            assert!(!PermitAction::Transition(PermitStatus::Approved).is_allowed(*role));
        }
    }

    #[test]
    fn authorize_reports_forbidden() {
        assert!(matches!(
            PermitAction::PublishTemplate.authorize(WorkspaceRole::Issuer),
            Err(AppError::Forbidden(_))
        ));
        assert!(PermitAction::PublishTemplate.authorize(WorkspaceRole::Owner).is_ok());
    }

    #[test]
    fn only_administrators_waive_qualifications() {
        assert!(PermitAction::RecordCredential.is_allowed(WorkspaceRole::Issuer));
        assert!(!PermitAction::RecordCredential.is_allowed(WorkspaceRole::Approver));
        assert!(!PermitAction::WaiveQualification.is_allowed(WorkspaceRole::Issuer));
        assert!(PermitAction::WaiveQualification.is_allowed(WorkspaceRole::Admin));
    }

    #[test]
    fn status_actions_follow_the_permit_prefix() {
        assert_eq!(
            AuditAction::for_status(PermitStatus::NeedsChanges).map(|action| action.as_str()),
            Some("permit.needs_changes")
        );
        assert_eq!(AuditAction::for_status(PermitStatus::Draft), None);
    }
}
