use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, WorkspaceId};

/// Membership role of an actor inside one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceRole {
    /// Workspace owner.
    Owner,
    /// Workspace administrator.
    Admin,
    /// Permit approver.
    Approver,
    /// Permit issuer.
    Issuer,
    /// Read-only member.
    Viewer,
}

impl WorkspaceRole {
    /// Returns the stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Approver => "approver",
            Self::Issuer => "issuer",
            Self::Viewer => "viewer",
        }
    }

    /// Returns all known roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[WorkspaceRole] = &[
            WorkspaceRole::Owner,
            WorkspaceRole::Admin,
            WorkspaceRole::Approver,
            WorkspaceRole::Issuer,
            WorkspaceRole::Viewer,
        ];

        ALL
    }

    /// Returns whether the role may act out of turn on approval chains.
    #[must_use]
    pub fn is_override(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl Display for WorkspaceRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "approver" => Ok(Self::Approver),
            "issuer" => Ok(Self::Issuer),
            "viewer" => Ok(Self::Viewer),
            _ => Err(AppError::Validation(format!(
                "unknown workspace role '{value}'"
            ))),
        }
    }
}

/// Identity and role context supplied by the external auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    actor_id: String,
    workspace_id: WorkspaceId,
    role: WorkspaceRole,
}

impl ActorContext {
    /// Creates an actor context from identity and membership data.
    #[must_use]
    pub fn new(actor_id: impl Into<String>, workspace_id: WorkspaceId, role: WorkspaceRole) -> Self {
        Self {
            actor_id: actor_id.into(),
            workspace_id,
            role,
        }
    }

    /// Returns the stable actor identifier.
    #[must_use]
    pub fn actor_id(&self) -> &str {
        self.actor_id.as_str()
    }

    /// Returns the workspace the actor is operating in.
    #[must_use]
    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// Returns the actor's membership role.
    #[must_use]
    pub fn role(&self) -> WorkspaceRole {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::WorkspaceRole;

    #[test]
    fn role_roundtrip_storage_value() {
        for role in WorkspaceRole::all() {
            let restored = WorkspaceRole::from_str(role.as_str());
            assert!(matches!(restored, Ok(parsed) if parsed == *role));
        }
    }

    #[test]
    fn only_admin_and_owner_override() {
        assert!(WorkspaceRole::Owner.is_override());
        assert!(WorkspaceRole::Admin.is_override());
        assert!(!WorkspaceRole::Approver.is_override());
        assert!(!WorkspaceRole::Issuer.is_override());
    }
}
