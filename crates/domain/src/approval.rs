use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ptw_core::{AppError, AppResult, WorkspaceRole};
use serde::{Deserialize, Serialize};

use crate::permit::PermitId;
use crate::template::ApprovalPlan;

/// Decision recorded by an approver on a submitted permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Approves the pending step.
    Approved,
    /// Rejects the permit outright.
    Rejected,
    /// Returns the permit to the issuer.
    Changes,
}

impl ApprovalDecision {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Changes => "changes",
        }
    }
}

impl Display for ApprovalDecision {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ApprovalDecision {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "changes" => Ok(Self::Changes),
            _ => Err(AppError::Validation(format!(
                "unknown approval decision '{value}'"
            ))),
        }
    }
}

/// How an approval relates to the pending step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Actor held the role of the pending step.
    InTurn,
    /// Admin or owner approved a step assigned to another role.
    Override,
}

impl ApprovalMode {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InTurn => "in_turn",
            Self::Override => "override",
        }
    }
}

impl FromStr for ApprovalMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "in_turn" => Ok(Self::InTurn),
            "override" => Ok(Self::Override),
            _ => Err(AppError::Validation(format!(
                "unknown approval mode '{value}'"
            ))),
        }
    }
}

/// Append-only decision record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    /// Permit the decision applies to.
    pub permit_id: PermitId,
    /// Deciding actor.
    pub actor_id: String,
    /// Role held by the actor when deciding.
    pub actor_role: WorkspaceRole,
    /// Decision.
    pub decision: ApprovalDecision,
    /// In-turn or override; only meaningful for approvals.
    pub mode: ApprovalMode,
    /// Approver comment.
    pub comment: String,
    /// Decision timestamp.
    pub decided_at: DateTime<Utc>,
}

/// Sequencer output: who approves next and how far the chain has advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalProgress {
    /// Role of the pending step; `None` once the chain is complete.
    pub next_role: Option<WorkspaceRole>,
    /// Number of steps in the chain.
    pub total_steps: usize,
    /// Approvals counted in the current round.
    pub approved_count: usize,
}

impl ApprovalProgress {
    /// Returns whether every step has been approved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.approved_count >= self.total_steps
    }

    /// Decides whether `role` may approve the pending step.
    pub fn authorize(&self, role: WorkspaceRole) -> AppResult<ApprovalMode> {
        match self.next_role {
            Some(next_role) if next_role == role => Ok(ApprovalMode::InTurn),
            Some(_) if role.is_override() => Ok(ApprovalMode::Override),
            next_role => Err(AppError::WrongApprovalStep {
                expected: next_role
                    .map(|next_role| next_role.as_str().to_owned())
                    .unwrap_or_else(|| "none".to_owned()),
                actual: role.as_str().to_owned(),
            }),
        }
    }
}

/// Derives approval progress from the plan and the chronological event log.
///
/// Only approvals recorded after the latest `changes` decision count, so a
/// resubmitted permit restarts its chain. The result depends on nothing but
/// the inputs.
#[must_use]
pub fn approval_progress(plan: &ApprovalPlan, events: &[ApprovalEvent]) -> ApprovalProgress {
    let roles = plan.roles();
    let round_start = events
        .iter()
        .rposition(|event| event.decision == ApprovalDecision::Changes)
        .map_or(0, |index| index + 1);
    let approved_count = events[round_start..]
        .iter()
        .filter(|event| event.decision == ApprovalDecision::Approved)
        .count();

    ApprovalProgress {
        next_role: roles.get(approved_count).copied(),
        total_steps: roles.len(),
        approved_count,
    }
}
