//! Consent tracking per (user, client) pair.
//!
//! [`ConsentManager::record_consent`] stores exactly the submitted scope set,
//! so a narrower resubmission retracts scopes. Callers that want to add to
//! what was previously approved use [`ConsentManager::extend_consent`].

use std::collections::BTreeSet;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::storage::ConsentStorage;
use crate::types::ConsentGrant;

/// Evaluates and records user consent.
#[derive(Clone)]
pub struct ConsentManager {
    storage: Arc<dyn ConsentStorage>,
}

impl ConsentManager {
    #[must_use]
    pub fn new(storage: Arc<dyn ConsentStorage>) -> Self {
        Self { storage }
    }

    /// Returns `true` iff a non-revoked grant covers every requested scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage lookup fails.
    pub async fn has_sufficient_consent<S: AsRef<str> + Sync>(
        &self,
        user_id: &str,
        client_id: &str,
        requested_scopes: &[S],
    ) -> AuthResult<bool> {
        let grant = self.storage.find(user_id, client_id).await?;
        Ok(grant.is_some_and(|g| g.is_active() && g.covers(requested_scopes)))
    }

    /// Records the full set of scopes the user currently approves.
    ///
    /// Replaces any previous set and clears a prior revocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub async fn record_consent<S: AsRef<str> + Sync>(
        &self,
        user_id: &str,
        client_id: &str,
        granted_scopes: &[S],
    ) -> AuthResult<ConsentGrant> {
        let scopes = granted_scopes
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.store(user_id, client_id, scopes).await
    }

    /// Adds scopes to whatever the user approved before.
    ///
    /// A revoked grant contributes nothing to the union.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage lookup or write fails.
    pub async fn extend_consent<S: AsRef<str> + Sync>(
        &self,
        user_id: &str,
        client_id: &str,
        granted_scopes: &[S],
    ) -> AuthResult<ConsentGrant> {
        let mut scopes: BTreeSet<String> = match self.storage.find(user_id, client_id).await? {
            Some(existing) if existing.is_active() => existing.scopes,
            _ => BTreeSet::new(),
        };
        scopes.extend(granted_scopes.iter().map(|s| s.as_ref().to_string()));
        self.store(user_id, client_id, scopes).await
    }

    /// Withdraws consent. Returns `true` if an active grant was revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub async fn revoke_consent(&self, user_id: &str, client_id: &str) -> AuthResult<bool> {
        self.storage
            .revoke(user_id, client_id, OffsetDateTime::now_utc())
            .await
    }

    async fn store(
        &self,
        user_id: &str,
        client_id: &str,
        scopes: BTreeSet<String>,
    ) -> AuthResult<ConsentGrant> {
        let grant = ConsentGrant {
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            scopes,
            issued_at: OffsetDateTime::now_utc(),
            revoked_at: None,
        };
        self.storage.upsert(&grant).await?;
        tracing::debug!(
            user_id = %user_id,
            client_id = %client_id,
            scopes = grant.scopes.len(),
            "Recorded consent"
        );
        Ok(grant)
    }
}
