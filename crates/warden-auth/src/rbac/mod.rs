//! Effective-permission resolution.
//!
//! A user's effective permissions are the union of:
//!
//! 1. active, unexpired direct grants ([`UserPermission`])
//! 2. permissions attached to every role in the closure of the user's
//!    active, unexpired role assignments, following `parent_id` upward
//!
//! Direct grants win: when the same identifier arrives from both paths the
//! direct entry is kept. Resolution fails closed, so any lookup error or
//! dangling reference aborts with an [`RbacError`] instead of returning a
//! smaller set.
//!
//! [`UserPermission`]: crate::types::UserPermission

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::AuthError;
use crate::storage::RbacStorage;
use crate::types::{Permission, Role};

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while resolving permissions.
#[derive(Debug, thiserror::Error)]
pub enum RbacError {
    /// A role assignment or parent pointer names a role that doesn't exist.
    #[error("Role not found: {role_id}")]
    MissingRole {
        /// The dangling role id.
        role_id: String,
    },

    /// A grant names a permission that doesn't exist.
    #[error("Permission not found: {permission_id}")]
    MissingPermission {
        /// The dangling permission id.
        permission_id: String,
    },

    /// The underlying storage failed.
    #[error(transparent)]
    Storage(#[from] AuthError),
}

impl From<RbacError> for AuthError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::Storage(inner) => inner,
            other => AuthError::internal(other.to_string()),
        }
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// Where an effective permission came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionSource {
    /// Granted to the user directly.
    Direct,
    /// Attached to this role (assigned or inherited).
    Role(String),
}

/// One resolved permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePermission {
    pub identifier: String,
    pub permission_id: String,
    pub source: PermissionSource,
}

/// The flattened permission set of a user, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePermissions {
    entries: BTreeMap<String, EffectivePermission>,
}

impl EffectivePermissions {
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Returns the source recorded for an identifier.
    #[must_use]
    pub fn source(&self, identifier: &str) -> Option<&PermissionSource> {
        self.entries.get(identifier).map(|e| &e.source)
    }

    /// Identifiers in sorted order, as placed in token claims.
    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectivePermission> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_direct(&mut self, permission: &Permission) {
        self.entries.insert(
            permission.identifier.clone(),
            EffectivePermission {
                identifier: permission.identifier.clone(),
                permission_id: permission.id.clone(),
                source: PermissionSource::Direct,
            },
        );
    }

    fn insert_from_role(&mut self, permission: &Permission, role_id: &str) {
        self.entries
            .entry(permission.identifier.clone())
            .or_insert_with(|| EffectivePermission {
                identifier: permission.identifier.clone(),
                permission_id: permission.id.clone(),
                source: PermissionSource::Role(role_id.to_string()),
            });
    }
}

// =============================================================================
// Role Closure
// =============================================================================

/// Expands assigned roles to include every ancestor.
///
/// Roles are looked up in an id-indexed map and parents are followed
/// iteratively with a visited set, so cycles in stored data terminate and the
/// walk is bounded by the number of roles. An inactive role contributes
/// nothing and ends its chain.
///
/// # Errors
///
/// Returns `RbacError::MissingRole` if an assigned role or a parent pointer
/// cannot be resolved.
pub fn role_closure(
    assigned: &[String],
    roles: &HashMap<String, Role>,
) -> Result<Vec<String>, RbacError> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut closure = Vec::new();

    for start in assigned {
        let mut current = Some(start.as_str());
        while let Some(role_id) = current {
            let role = roles.get(role_id).ok_or_else(|| RbacError::MissingRole {
                role_id: role_id.to_string(),
            })?;
            if !role.active || !visited.insert(role.id.as_str()) {
                break;
            }
            closure.push(role.id.clone());
            current = role.parent_id.as_deref();
        }
    }

    Ok(closure)
}

// =============================================================================
// Resolver
// =============================================================================

/// Computes effective permissions from RBAC storage.
#[derive(Clone)]
pub struct RbacResolver {
    storage: Arc<dyn RbacStorage>,
}

impl RbacResolver {
    #[must_use]
    pub fn new(storage: Arc<dyn RbacStorage>) -> Self {
        Self { storage }
    }

    /// Resolves the effective permissions of a user now.
    ///
    /// # Errors
    ///
    /// See [`RbacResolver::effective_permissions_at`].
    pub async fn effective_permissions(
        &self,
        user_id: &str,
    ) -> Result<EffectivePermissions, RbacError> {
        self.effective_permissions_at(user_id, OffsetDateTime::now_utc())
            .await
    }

    /// Resolves the effective permissions of a user as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if any storage lookup fails or a role or permission
    /// reference is dangling.
    pub async fn effective_permissions_at(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> Result<EffectivePermissions, RbacError> {
        let direct_grants: Vec<String> = self
            .storage
            .user_permissions(user_id)
            .await?
            .into_iter()
            .filter(|g| g.is_effective_at(now))
            .map(|g| g.permission_id)
            .collect();

        let assigned: Vec<String> = self
            .storage
            .user_roles(user_id)
            .await?
            .into_iter()
            .filter(|a| a.is_effective_at(now))
            .map(|a| a.role_id)
            .collect();

        let closure = if assigned.is_empty() {
            Vec::new()
        } else {
            let roles: HashMap<String, Role> = self
                .storage
                .roles()
                .await?
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect();
            role_closure(&assigned, &roles)?
        };

        let role_grants = if closure.is_empty() {
            Vec::new()
        } else {
            self.storage.role_permissions(&closure).await?
        };

        let mut wanted: Vec<String> = direct_grants.clone();
        wanted.extend(role_grants.iter().map(|rp| rp.permission_id.clone()));
        wanted.sort();
        wanted.dedup();

        let permissions: HashMap<String, Permission> = if wanted.is_empty() {
            HashMap::new()
        } else {
            self.storage
                .permissions(&wanted)
                .await?
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect()
        };
        let lookup = |id: &str| {
            permissions
                .get(id)
                .ok_or_else(|| RbacError::MissingPermission {
                    permission_id: id.to_string(),
                })
        };

        let mut result = EffectivePermissions::default();

        for permission_id in &direct_grants {
            let permission = lookup(permission_id)?;
            if permission.active {
                result.insert_direct(permission);
            }
        }

        // Follow closure order so the nearest role is recorded as the source.
        for role_id in &closure {
            for grant in role_grants.iter().filter(|rp| &rp.role_id == role_id) {
                let permission = lookup(&grant.permission_id)?;
                if permission.active {
                    result.insert_from_role(permission, role_id);
                }
            }
        }

        tracing::debug!(
            user_id = %user_id,
            roles = closure.len(),
            permissions = result.len(),
            "Resolved effective permissions"
        );

        Ok(result)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthResult;
    use crate::types::{RolePermission, UserPermission, UserRole};
    use async_trait::async_trait;
    use std::sync::RwLock;
    use time::Duration;

    #[derive(Default)]
    struct MockRbacStorage {
        user_permissions: RwLock<Vec<UserPermission>>,
        user_roles: RwLock<Vec<UserRole>>,
        roles: RwLock<Vec<Role>>,
        role_permissions: RwLock<Vec<RolePermission>>,
        permissions: RwLock<Vec<Permission>>,
        fail: RwLock<bool>,
    }

    impl MockRbacStorage {
        fn check(&self) -> AuthResult<()> {
            if *self.fail.read().unwrap() {
                Err(AuthError::storage("rbac backend unavailable"))
            } else {
                Ok(())
            }
        }

        fn permission(&self, id: &str, identifier: &str) {
            self.permissions.write().unwrap().push(Permission {
                id: id.to_string(),
                identifier: identifier.to_string(),
                name: identifier.to_string(),
                description: String::new(),
                active: true,
            });
        }

        fn role(&self, id: &str, parent: Option<&str>) {
            self.roles.write().unwrap().push(Role {
                id: id.to_string(),
                name: id.to_string(),
                parent_id: parent.map(str::to_string),
                active: true,
            });
        }

        fn attach(&self, role_id: &str, permission_id: &str) {
            self.role_permissions.write().unwrap().push(RolePermission {
                role_id: role_id.to_string(),
                permission_id: permission_id.to_string(),
            });
        }

        fn assign(&self, user_id: &str, role_id: &str) {
            self.user_roles.write().unwrap().push(UserRole {
                user_id: user_id.to_string(),
                role_id: role_id.to_string(),
                active: true,
                expires_at: None,
                assigned_by: "test".to_string(),
            });
        }

        fn grant(&self, user_id: &str, permission_id: &str) {
            self.user_permissions.write().unwrap().push(UserPermission {
                user_id: user_id.to_string(),
                permission_id: permission_id.to_string(),
                active: true,
                expires_at: None,
            });
        }
    }

    #[async_trait]
    impl RbacStorage for MockRbacStorage {
        async fn user_permissions(&self, user_id: &str) -> AuthResult<Vec<UserPermission>> {
            self.check()?;
            Ok(self
                .user_permissions
                .read()
                .unwrap()
                .iter()
                .filter(|g| g.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn user_roles(&self, user_id: &str) -> AuthResult<Vec<UserRole>> {
            self.check()?;
            Ok(self
                .user_roles
                .read()
                .unwrap()
                .iter()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn roles(&self) -> AuthResult<Vec<Role>> {
            self.check()?;
            Ok(self.roles.read().unwrap().clone())
        }

        async fn role_permissions(&self, role_ids: &[String]) -> AuthResult<Vec<RolePermission>> {
            self.check()?;
            Ok(self
                .role_permissions
                .read()
                .unwrap()
                .iter()
                .filter(|rp| role_ids.contains(&rp.role_id))
                .cloned()
                .collect())
        }

        async fn permissions(&self, ids: &[String]) -> AuthResult<Vec<Permission>> {
            self.check()?;
            Ok(self
                .permissions
                .read()
                .unwrap()
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }
    }

    fn resolver(storage: Arc<MockRbacStorage>) -> RbacResolver {
        RbacResolver::new(storage)
    }

    #[tokio::test]
    async fn test_no_grants_is_empty() {
        let storage = Arc::new(MockRbacStorage::default());
        let perms = resolver(storage)
            .effective_permissions("nobody")
            .await
            .unwrap();
        assert!(perms.is_empty());
    }

    #[tokio::test]
    async fn test_ancestor_permissions_included_unrelated_excluded() {
        let storage = Arc::new(MockRbacStorage::default());
        storage.permission("p-read", "reports:read");
        storage.permission("p-write", "reports:write");
        storage.permission("p-admin", "system:admin");
        storage.role("viewer", None);
        storage.role("editor", Some("viewer"));
        storage.role("admin", None);
        storage.attach("viewer", "p-read");
        storage.attach("editor", "p-write");
        storage.attach("admin", "p-admin");
        storage.assign("alice", "editor");

        let perms = resolver(storage)
            .effective_permissions("alice")
            .await
            .unwrap();
        assert_eq!(perms.identifiers(), vec!["reports:read", "reports:write"]);
        assert_eq!(
            perms.source("reports:read"),
            Some(&PermissionSource::Role("viewer".to_string()))
        );
        assert!(!perms.contains("system:admin"));
    }

    #[tokio::test]
    async fn test_direct_grant_takes_precedence() {
        let storage = Arc::new(MockRbacStorage::default());
        storage.permission("p-read", "reports:read");
        storage.role("viewer", None);
        storage.attach("viewer", "p-read");
        storage.assign("alice", "viewer");
        storage.grant("alice", "p-read");

        let perms = resolver(storage)
            .effective_permissions("alice")
            .await
            .unwrap();
        assert_eq!(perms.len(), 1);
        assert_eq!(perms.source("reports:read"), Some(&PermissionSource::Direct));
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let storage = Arc::new(MockRbacStorage::default());
        storage.permission("p-a", "a:x");
        storage.permission("p-b", "b:x");
        storage.role("a", Some("b"));
        storage.role("b", Some("a"));
        storage.attach("a", "p-a");
        storage.attach("b", "p-b");
        storage.assign("alice", "a");

        let perms = resolver(storage)
            .effective_permissions("alice")
            .await
            .unwrap();
        assert_eq!(perms.identifiers(), vec!["a:x", "b:x"]);
    }

    #[tokio::test]
    async fn test_expired_and_inactive_rows_ignored() {
        let storage = Arc::new(MockRbacStorage::default());
        let now = OffsetDateTime::now_utc();
        storage.permission("p-read", "reports:read");
        storage.permission("p-old", "legacy:use");
        storage.role("viewer", None);
        storage.attach("viewer", "p-read");
        storage.user_roles.write().unwrap().push(UserRole {
            user_id: "alice".to_string(),
            role_id: "viewer".to_string(),
            active: true,
            expires_at: Some(now - Duration::minutes(1)),
            assigned_by: "test".to_string(),
        });
        storage.user_permissions.write().unwrap().push(UserPermission {
            user_id: "alice".to_string(),
            permission_id: "p-old".to_string(),
            active: false,
            expires_at: None,
        });

        let perms = resolver(storage)
            .effective_permissions_at("alice", now)
            .await
            .unwrap();
        assert!(perms.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_permission_not_resolved() {
        let storage = Arc::new(MockRbacStorage::default());
        storage.permission("p-read", "reports:read");
        storage.permissions.write().unwrap()[0].active = false;
        storage.grant("alice", "p-read");

        let perms = resolver(storage)
            .effective_permissions("alice")
            .await
            .unwrap();
        assert!(perms.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_role_stops_inheritance() {
        let storage = Arc::new(MockRbacStorage::default());
        storage.permission("p-root", "root:x");
        storage.permission("p-mid", "mid:x");
        storage.permission("p-leaf", "leaf:x");
        storage.role("root", None);
        storage.role("mid", Some("root"));
        storage.role("leaf", Some("mid"));
        storage.roles.write().unwrap()[1].active = false;
        storage.attach("root", "p-root");
        storage.attach("mid", "p-mid");
        storage.attach("leaf", "p-leaf");
        storage.assign("alice", "leaf");

        let perms = resolver(storage)
            .effective_permissions("alice")
            .await
            .unwrap();
        assert_eq!(perms.identifiers(), vec!["leaf:x"]);
    }

    #[tokio::test]
    async fn test_missing_parent_fails_closed() {
        let storage = Arc::new(MockRbacStorage::default());
        storage.role("orphan", Some("ghost"));
        storage.assign("alice", "orphan");

        let err = resolver(storage)
            .effective_permissions("alice")
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::MissingRole { role_id } if role_id == "ghost"));
    }

    #[tokio::test]
    async fn test_storage_failure_fails_closed() {
        let storage = Arc::new(MockRbacStorage::default());
        storage.grant("alice", "p-read");
        *storage.fail.write().unwrap() = true;

        let err = resolver(storage)
            .effective_permissions("alice")
            .await
            .unwrap_err();
        let auth: AuthError = err.into();
        assert_eq!(auth.oauth_error_code(), "server_error");
    }

    #[test]
    fn test_role_closure_shared_ancestor_listed_once() {
        let mut roles = HashMap::new();
        for (id, parent) in [("base", None), ("a", Some("base")), ("b", Some("base"))] {
            roles.insert(
                id.to_string(),
                Role {
                    id: id.to_string(),
                    name: id.to_string(),
                    parent_id: parent.map(str::to_string),
                    active: true,
                },
            );
        }
        let closure = role_closure(&["a".to_string(), "b".to_string()], &roles).unwrap();
        assert_eq!(closure, vec!["a", "base", "b"]);
    }
}
