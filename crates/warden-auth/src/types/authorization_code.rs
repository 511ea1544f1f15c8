//! Authorization code record.
//!
//! Created by the authorization engine after a successful `/authorize`
//! request, redeemed at most once by the token engine.
//!
//! # Security
//!
//! - Codes are 256-bit random values, base64url-encoded
//! - `used` moves from false to true exactly once and never back
//! - The PKCE challenge is stored for verification at redemption

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An issued authorization code and everything it is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Opaque code value handed to the client.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// End user who approved the request.
    pub user_id: String,

    /// Exact redirect URI used at `/authorize`.
    pub redirect_uri: String,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// PKCE challenge, when the request carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE method (always `S256` when present).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// OpenID Connect nonce, passed through to the issued token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// When the code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the code stops being redeemable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Set once the code has been redeemed.
    #[serde(default)]
    pub used: bool,
}

impl AuthorizationCode {
    /// Returns `true` if the code has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the code can still be redeemed at `now`.
    #[must_use]
    pub fn is_redeemable_at(&self, now: OffsetDateTime) -> bool {
        !self.used && !self.is_expired_at(now)
    }
}
