//! User identities and roles.
//!
//! Profiles are owned by the identity provider; this crate only reads them.

use crate::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role of an authenticated user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including deletion
    Admin,
    /// Sees every ticket, assigns and verifies work
    Supervisor,
    /// Sees tickets they created or are assigned to
    FieldEngineer,
}

impl Role {
    /// Admins and supervisors hold elevated privileges.
    #[must_use]
    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::Admin | Self::Supervisor)
    }

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Supervisor => "supervisor",
            Self::FieldEngineer => "field_engineer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid role: {0} (expected admin|supervisor|field_engineer)")]
pub struct ParseRoleError(String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "supervisor" => Ok(Self::Supervisor),
            "field_engineer" => Ok(Self::FieldEngineer),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// User profile as published by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID.
    pub id: UserId,

    /// Email address.
    pub email: String,

    /// Display name.
    pub full_name: String,

    /// Role.
    pub role: Role,

    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,

    /// Inactive users cannot act on tickets or receive assignments.
    pub is_active: bool,

    /// Profile created timestamp.
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// The acting identity for this profile.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }

    /// Name used in human-readable messages.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }
}

/// The authenticated identity performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// User ID.
    pub id: UserId,
    /// Role at the time of the call.
    pub role: Role,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether the actor is an admin or supervisor.
    #[must_use]
    pub const fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    /// Whether the actor is an admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;

    #[test]
    fn parse_role_valid_values() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Supervisor".parse::<Role>().unwrap(), Role::Supervisor);
        assert_eq!("FIELD_ENGINEER".parse::<Role>().unwrap(), Role::FieldEngineer);
    }

    #[test]
    fn parse_role_invalid_returns_error() {
        assert!("root".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn only_admin_and_supervisor_are_elevated() {
        assert!(Role::Admin.is_elevated());
        assert!(Role::Supervisor.is_elevated());
        assert!(!Role::FieldEngineer.is_elevated());
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::FieldEngineer).unwrap(),
            "\"field_engineer\""
        );
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let profile = UserProfile {
            id: UserId::new(),
            email: "ana@example.com".to_string(),
            full_name: "  ".to_string(),
            role: Role::FieldEngineer,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        };
        assert_eq!(profile.display_name(), "ana@example.com");
    }
}
