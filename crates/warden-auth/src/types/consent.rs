//! User consent records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The scopes a user has approved for one client.
///
/// Unique per `(user_id, client_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentGrant {
    pub user_id: String,
    pub client_id: String,

    /// Approved scopes.
    pub scopes: BTreeSet<String>,

    /// When the current scope set was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// Set when the user withdraws consent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,
}

impl ConsentGrant {
    /// Returns `true` unless the grant has been revoked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// Returns `true` if every requested scope is covered by this grant.
    #[must_use]
    pub fn covers<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested.iter().all(|s| self.scopes.contains(s.as_ref()))
    }
}
