//! RBAC storage trait.
//!
//! Read-only lookups used by the effective-permission resolver. Rows are
//! returned unfiltered; the resolver applies `active` and expiry rules.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Permission, Role, RolePermission, UserPermission, UserRole};

/// Storage trait for roles and permissions.
#[async_trait]
pub trait RbacStorage: Send + Sync {
    /// Direct permission grants for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn user_permissions(&self, user_id: &str) -> AuthResult<Vec<UserPermission>>;

    /// Role assignments for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn user_roles(&self, user_id: &str) -> AuthResult<Vec<UserRole>>;

    /// All roles. The resolver indexes them by id to walk parent chains.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn roles(&self) -> AuthResult<Vec<Role>>;

    /// Permission attachments for the given roles.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn role_permissions(&self, role_ids: &[String]) -> AuthResult<Vec<RolePermission>>;

    /// Permissions by id. Unknown ids are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn permissions(&self, permission_ids: &[String]) -> AuthResult<Vec<Permission>>;
}
