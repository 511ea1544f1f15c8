//! Issued token records.
//!
//! Every access and refresh token gets a row keyed by the SHA-256 hash of its
//! wire value and by its `jti`. Access tokens are also self-contained signed
//! JWTs; the row is what revocation and replay checks consult.
//!
//! # Storage Security
//!
//! The token itself is never stored. When validating a presented token:
//!
//! 1. Hash the incoming value
//! 2. Look up by hash
//! 3. Validate expiration and revocation status

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Access or refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Bearer access token (signed JWT).
    AccessToken,
    /// Opaque refresh token.
    RefreshToken,
}

impl TokenKind {
    /// Returns the RFC 7009 `token_type_hint` value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// A persisted token row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Unique token id (`jti`).
    pub token_id: String,

    /// SHA-256 hex digest of the wire value.
    pub token_hash: String,

    /// Access or refresh.
    pub kind: TokenKind,

    /// Client the token was issued to.
    pub client_id: String,

    /// End user, absent for client_credentials tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When the token was revoked or rotated away.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,

    /// `jti` of the refresh token this one replaced during rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_from: Option<String>,
}

impl TokenRecord {
    /// Returns `true` if this token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Returns `true` if this token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the token is neither revoked nor expired at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }
}
