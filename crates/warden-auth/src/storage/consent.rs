//! Consent storage trait.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::ConsentGrant;

/// Storage trait for per-(user, client) consent grants.
#[async_trait]
pub trait ConsentStorage: Send + Sync {
    /// Finds the grant for a user and client, revoked or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, user_id: &str, client_id: &str) -> AuthResult<Option<ConsentGrant>>;

    /// Inserts the grant, or replaces the existing one for the same pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert(&self, grant: &ConsentGrant) -> AuthResult<()>;

    /// Marks the grant revoked.
    ///
    /// # Returns
    ///
    /// `true` if an active grant was revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, user_id: &str, client_id: &str, now: OffsetDateTime)
    -> AuthResult<bool>;
}
