//! Scope registry storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::ScopeDefinition;

/// Read access to the scopes known to the server.
#[async_trait]
pub trait ScopeStorage: Send + Sync {
    /// Returns the definitions for the given scope names.
    ///
    /// Unknown names are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_scopes(&self, names: &[String]) -> AuthResult<Vec<ScopeDefinition>>;

    /// Returns every active scope, for discovery metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_active(&self) -> AuthResult<Vec<ScopeDefinition>>;
}
