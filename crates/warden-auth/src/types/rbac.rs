//! Role-based access control records.
//!
//! Roles form a single-parent forest. Permissions reach a user either
//! directly ([`UserPermission`]) or through a role assignment
//! ([`UserRole`]) and that role's ancestors.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A role in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Parent role, inherited from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Inactive roles grant nothing.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A permission that can be granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Stable permission id.
    pub id: String,

    /// Identifier placed in tokens, e.g. `reports:read`.
    pub identifier: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Inactive permissions are never resolved.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A permission granted directly to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    pub user_id: String,
    pub permission_id: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires_at: Option<OffsetDateTime>,
}

/// A permission attached to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: String,
    pub permission_id: String,
}

/// A role assigned to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: String,
    pub role_id: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires_at: Option<OffsetDateTime>,

    /// Who made the assignment.
    #[serde(default)]
    pub assigned_by: String,
}

fn default_true() -> bool {
    true
}

fn is_live(active: bool, expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    active && expires_at.is_none_or(|exp| now < exp)
}

impl UserPermission {
    /// Returns `true` if the grant is active and not expired at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: OffsetDateTime) -> bool {
        is_live(self.active, self.expires_at, now)
    }
}

impl UserRole {
    /// Returns `true` if the assignment is active and not expired at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: OffsetDateTime) -> bool {
        is_live(self.active, self.expires_at, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_user_role_expiry() {
        let now = OffsetDateTime::now_utc();
        let mut assignment = UserRole {
            user_id: "alice".to_string(),
            role_id: "admin".to_string(),
            active: true,
            expires_at: None,
            assigned_by: "root".to_string(),
        };
        assert!(assignment.is_effective_at(now));

        assignment.expires_at = Some(now - Duration::seconds(1));
        assert!(!assignment.is_effective_at(now));

        assignment.expires_at = Some(now + Duration::hours(1));
        assignment.active = false;
        assert!(!assignment.is_effective_at(now));
    }

    #[test]
    fn test_user_permission_expires_at_boundary() {
        let now = OffsetDateTime::now_utc();
        let grant = UserPermission {
            user_id: "alice".to_string(),
            permission_id: "p1".to_string(),
            active: true,
            expires_at: Some(now),
        };
        assert!(!grant.is_effective_at(now));
        assert!(grant.is_effective_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_role_defaults_active() {
        let role: Role = serde_json::from_str(r#"{"id":"r1","name":"Reader"}"#).unwrap();
        assert!(role.active);
        assert!(role.parent_id.is_none());
    }
}
