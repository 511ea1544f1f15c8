//! Client registry storage trait.
//!
//! Defines the interface for OAuth client persistence operations.
//! Implementations are provided by storage backends (e.g. `warden-auth-memory`).

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Client, ClientUpdate};

// =============================================================================
// Client Storage Trait
// =============================================================================

/// Storage operations for OAuth 2.0 clients.
///
/// # Example
///
/// ```ignore
/// use warden_auth::storage::ClientStorage;
///
/// async fn example(storage: &impl ClientStorage) -> warden_auth::AuthResult<()> {
///     if let Some(client) = storage.find_by_client_id("my-app").await? {
///         println!("Found client: {}", client.name);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Find a client by its OAuth client_id.
    ///
    /// Inactive clients are returned too; callers check `active`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The client validation fails
    /// - A client with the same client_id already exists
    /// - The storage operation fails
    async fn create(&self, client: &Client) -> AuthResult<Client>;

    /// Apply a partial update to an existing client.
    ///
    /// Only the fields named by [`ClientUpdate`] can change. The update is
    /// applied in full or not at all.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The client doesn't exist
    /// - Any updated field fails validation
    /// - The storage operation fails
    async fn update(&self, client_id: &str, update: &ClientUpdate) -> AuthResult<Client>;

    /// List all clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self) -> AuthResult<Vec<Client>>;
}
