//! Authorization code storage trait.
//!
//! # Security Considerations
//!
//! - A code is redeemed at most once; [`AuthorizationCodeStorage::redeem`]
//!   is the only operation that flips `used`
//! - Expired codes should be cleaned up periodically

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::{AuthorizationCode, TokenRecord};

/// Storage trait for authorization codes.
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Stores a newly issued code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code already exists or the storage
    /// operation fails.
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Finds a code by its value, regardless of `used` or expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Redeems a code and persists the tokens issued for it, atomically.
    ///
    /// In one transaction: re-check that the code exists, is unused and
    /// unexpired at `now`; set `used = true`; insert every record in
    /// `tokens`. Returns `Ok(false)` and changes nothing if the re-check
    /// fails, so of two concurrent callers exactly one observes `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Nothing is
    /// persisted in that case.
    async fn redeem(
        &self,
        code: &str,
        now: OffsetDateTime,
        tokens: &[TokenRecord],
    ) -> AuthResult<bool>;

    /// Deletes codes that expired before `now`.
    ///
    /// # Returns
    ///
    /// The number of codes deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
