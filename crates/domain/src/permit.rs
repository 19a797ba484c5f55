use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ptw_core::{AppError, AppResult, NonEmptyString, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::template::TemplateRef;

/// Lifecycle status of a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitStatus {
    /// Being prepared by the issuer.
    Draft,
    /// Waiting for the approval chain.
    Submitted,
    /// Returned to the issuer for edits.
    NeedsChanges,
    /// Approval chain completed.
    Approved,
    /// Work is in progress on site.
    Active,
    /// Work finished and closed out.
    Closed,
    /// Withdrawn or rejected.
    Cancelled,
    /// Validity window lapsed.
    Expired,
}

impl PermitStatus {
    /// Returns the stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::NeedsChanges => "needs_changes",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Returns all known statuses.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermitStatus] = &[
            PermitStatus::Draft,
            PermitStatus::Submitted,
            PermitStatus::NeedsChanges,
            PermitStatus::Approved,
            PermitStatus::Active,
            PermitStatus::Closed,
            PermitStatus::Cancelled,
            PermitStatus::Expired,
        ];

        ALL
    }

    /// Returns every status reachable from this one in a single edge.
    #[must_use]
    pub fn allowed_targets(&self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Submitted, Self::Cancelled],
            Self::Submitted => &[Self::NeedsChanges, Self::Approved, Self::Cancelled],
            Self::NeedsChanges => &[Self::Submitted, Self::Cancelled],
            Self::Approved => &[Self::Active, Self::Cancelled, Self::Expired],
            Self::Active => &[Self::Closed, Self::Cancelled, Self::Expired],
            Self::Closed | Self::Cancelled | Self::Expired => &[],
        }
    }

    /// Returns whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }
}

impl Display for PermitStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for PermitStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "needs_changes" => Ok(Self::NeedsChanges),
            "approved" => Ok(Self::Approved),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            _ => Err(AppError::Validation(format!(
                "unknown permit status '{value}'"
            ))),
        }
    }
}

/// Returns whether the status machine admits the `from -> to` edge.
#[must_use]
pub fn can_transition(from: PermitStatus, to: PermitStatus) -> bool {
    from.allowed_targets().contains(&to)
}

/// Admits the `from -> to` edge or returns an `InvalidTransition` refusal.
pub fn ensure_transition(from: PermitStatus, to: PermitStatus) -> AppResult<()> {
    if can_transition(from, to) {
        return Ok(());
    }

    Err(AppError::InvalidTransition {
        from: from.as_str().to_owned(),
        to: to.as_str().to_owned(),
    })
}

/// Stable permit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermitId(Uuid);

impl PermitId {
    /// Creates a random permit identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a permit identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Parses a transport value into a permit identifier.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid permit id '{value}': {error}")))
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PermitId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PermitId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Outcome text captured when a permit leaves the happy path or is closed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PermitResolution {
    /// Work completed; closure note from the issuer.
    Closed {
        /// Closure note.
        closure_note: String,
    },
    /// Permit cancelled by an issuer or administrator.
    Cancelled {
        /// Cancellation reason.
        reason: String,
    },
    /// Approver returned the permit for edits.
    ChangesRequested {
        /// Requested changes.
        reason: String,
    },
    /// Approver rejected the permit.
    Rejected {
        /// Rejection reason.
        reason: String,
    },
}

/// Typed permit metadata read by the workflow, plus an open extension map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermitMetadata {
    /// Work location.
    pub location: String,
    /// Contractor performing the work, when known.
    pub contractor_id: Option<String>,
    /// Latest closure/cancellation/change outcome.
    pub resolution: Option<PermitResolution>,
    /// Forward-compatible extra keys that the workflow never reads.
    #[serde(default)]
    pub extensions: BTreeMap<String, Value>,
}

impl PermitMetadata {
    /// Creates metadata for a new permit.
    #[must_use]
    pub fn new(location: NonEmptyString, contractor_id: Option<String>) -> Self {
        Self {
            location: location.into(),
            contractor_id: contractor_id
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            resolution: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Returns a copy carrying the provided resolution.
    #[must_use]
    pub fn with_resolution(&self, resolution: PermitResolution) -> Self {
        let mut metadata = self.clone();
        metadata.resolution = Some(resolution);
        metadata
    }
}

/// How the create request reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitSource {
    /// Submitted interactively.
    Online,
    /// Replayed from a client-side offline draft queue.
    OfflineQueue,
}

impl PermitSource {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::OfflineQueue => "offline_queue",
        }
    }
}

impl FromStr for PermitSource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "online" => Ok(Self::Online),
            "offline_queue" => Ok(Self::OfflineQueue),
            _ => Err(AppError::Validation(format!(
                "unknown permit source '{value}'"
            ))),
        }
    }
}

/// Work-authorization document tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permit {
    /// Permit identifier.
    pub id: PermitId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Permit title.
    pub title: String,
    /// Current lifecycle status.
    pub status: PermitStatus,
    /// Typed metadata.
    pub metadata: PermitMetadata,
    /// Planned start.
    pub start_at: Option<DateTime<Utc>>,
    /// Planned or actual end.
    pub end_at: Option<DateTime<Utc>>,
    /// Pinned template snapshot, if any.
    pub template: Option<TemplateRef>,
    /// Creation channel.
    pub source: PermitSource,
    /// Actor that created the permit.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Status write produced by the workflow, applied atomically by repositories.
#[derive(Debug, Clone, PartialEq)]
pub struct PermitStatusUpdate {
    /// Target status.
    pub next_status: PermitStatus,
    /// Metadata after the transition.
    pub metadata: PermitMetadata,
    /// End timestamp after the transition.
    pub end_at: Option<DateTime<Utc>>,
    /// Transition timestamp.
    pub changed_at: DateTime<Utc>,
}

impl PermitStatusUpdate {
    /// Creates an update that only moves status, keeping derived fields.
    #[must_use]
    pub fn status_only(permit: &Permit, next_status: PermitStatus, changed_at: DateTime<Utc>) -> Self {
        Self {
            next_status,
            metadata: permit.metadata.clone(),
            end_at: permit.end_at,
            changed_at,
        }
    }

    /// Applies the update to a freshly loaded permit, re-checking admission.
    ///
    /// `expected_status` is the status observed when the caller evaluated the
    /// action. A different stored status means a concurrent writer won.
    pub fn apply(&self, permit: &mut Permit, expected_status: PermitStatus) -> AppResult<()> {
        if permit.status != expected_status {
            return Err(AppError::Conflict(format!(
                "permit '{}' changed from '{}' to '{}' concurrently",
                permit.id, expected_status, permit.status
            )));
        }
        ensure_transition(permit.status, self.next_status)?;

        permit.status = self.next_status;
        permit.metadata = self.metadata.clone();
        permit.end_at = self.end_at;
        permit.updated_at = self.changed_at;
        Ok(())
    }
}
