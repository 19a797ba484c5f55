//! Shared primitives for all Rust crates in the permit-to-work service.

#![forbid(unsafe_code)]

/// Actor identity and workspace role primitives.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use auth::{ActorContext, WorkspaceRole};

/// Result type used across permit-to-work crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Creates a validated non-empty string, naming the field in the error.
    pub fn for_field(field: &str, value: impl Into<String>) -> AppResult<Self> {
        Self::new(value).map_err(|_| AppError::Validation(format!("{field} is required")))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Workspace (tenant) identifier used as the partition key for every persisted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkspaceId(Uuid);

impl WorkspaceId {
    /// Creates a random workspace identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a workspace identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for WorkspaceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
///
/// Domain refusals (`InvalidTransition`, `GateBlocked`, `WrongApprovalStep`)
/// are ordinary outcomes of the permit workflow, kept distinct from input
/// validation so callers can map them to their own transport status.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but its role is not permitted for the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Permit status machine refused the requested edge.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current stored status.
        from: String,
        /// Requested target status.
        to: String,
    },

    /// Qualification, training or checklist gate refused the action.
    #[error("gate blocked: {0}")]
    GateBlocked(String),

    /// Actor role does not match the pending approval step.
    #[error("wrong approval step: expected {expected}, got {actual}")]
    WrongApprovalStep {
        /// Role required by the pending step, if any step is pending.
        expected: String,
        /// Role of the actor that attempted the approval.
        actual: String,
    },

    /// Caller exceeded a rate limit window.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the stable discriminant string for transport payloads.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::GateBlocked(_) => "gate_blocked",
            Self::WrongApprovalStep { .. } => "wrong_approval_step",
            Self::RateLimited(_) => "rate_limited",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString, WorkspaceId};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn non_empty_string_trims_value() {
        let value = NonEmptyString::new("  fix location ").unwrap_or_else(|_| unreachable!());
        assert_eq!(value.as_str(), "fix location");
    }

    #[test]
    fn field_error_names_the_field() {
        let error = NonEmptyString::for_field("closure_note", "").err();
        assert!(matches!(
            error,
            Some(AppError::Validation(message)) if message == "closure_note is required"
        ));
    }

    #[test]
    fn workspace_id_formats_as_uuid() {
        let workspace_id = WorkspaceId::new();
        assert_eq!(workspace_id.to_string().len(), 36);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            AppError::InvalidTransition {
                from: "closed".to_owned(),
                to: "active".to_owned(),
            }
            .code(),
            "invalid_transition"
        );
        assert_eq!(AppError::GateBlocked(String::new()).code(), "gate_blocked");
        assert_eq!(AppError::Validation(String::new()).code(), "validation_error");
    }
}
