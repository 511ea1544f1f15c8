//! Token storage trait.
//!
//! This module defines the storage interface for issued access and refresh
//! tokens.
//!
//! # Security Considerations
//!
//! - Tokens are stored as SHA-256 hashes only
//! - Revocation must be atomic and immediate
//! - Refresh rotation revokes the old row and inserts the new ones in one
//!   transaction

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::TokenRecord;

/// Storage trait for token records.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Stores new token records.
    ///
    /// # Errors
    ///
    /// Returns an error if a record with the same hash or jti exists, or the
    /// storage operation fails. Either all records are stored or none.
    async fn create(&self, records: &[TokenRecord]) -> AuthResult<()>;

    /// Finds a token by the hash of its wire value.
    ///
    /// Revoked and expired records are returned; callers check them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<TokenRecord>>;

    /// Finds a token by its `jti`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_jti(&self, token_id: &str) -> AuthResult<Option<TokenRecord>>;

    /// Rotates a refresh token atomically.
    ///
    /// In one transaction: re-check that `old_hash` exists and is active at
    /// `now`; set its `revoked_at`; insert every record in `new_tokens`.
    /// Returns `Ok(false)` and changes nothing if the re-check fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        now: OffsetDateTime,
        new_tokens: &[TokenRecord],
    ) -> AuthResult<bool>;

    /// Marks the token with this hash revoked.
    ///
    /// # Returns
    ///
    /// `true` if a matching record was found. Revoking an already revoked
    /// token is a no-op that still returns `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_by_hash(&self, token_hash: &str, now: OffsetDateTime) -> AuthResult<bool>;

    /// Marks the token with this `jti` revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_by_jti(&self, token_id: &str, now: OffsetDateTime) -> AuthResult<bool>;

    /// Deletes tokens that expired before `now`.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
