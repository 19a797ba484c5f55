use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ptw_core::{AppResult, WorkspaceId};
use ptw_domain::PermitId;

/// Kind of notification sent by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Permit entered `submitted`.
    PermitSubmitted,
    /// An intermediate approval moved the chain to the next role.
    ApprovalStepPending,
    /// Final approval, rejection or change request.
    PermitDecision,
    /// Daily qualification expiry digest.
    QualificationDigest,
}

impl NotificationKind {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermitSubmitted => "permit_submitted",
            Self::ApprovalStepPending => "approval_step_pending",
            Self::PermitDecision => "permit_decision",
            Self::QualificationDigest => "qualification_digest",
        }
    }
}

/// Outcome of one delivery attempt sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Workspace scope.
    pub workspace_id: WorkspaceId,
    /// Notification kind.
    pub kind: NotificationKind,
    /// Related permit.
    pub permit_id: Option<PermitId>,
    /// Number of resolved recipients.
    pub recipient_count: usize,
    /// Whether the provider accepted the message.
    pub delivered: bool,
    /// Last provider error.
    pub error: Option<String>,
    /// Send attempts made.
    pub attempts: u32,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
}

/// Port for persisting notification outcomes.
#[async_trait]
pub trait NotificationLogRepository: Send + Sync {
    /// Persists one delivery outcome.
    async fn record_notification(&self, record: NotificationRecord) -> AppResult<()>;
}
