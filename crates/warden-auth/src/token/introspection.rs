//! Token introspection (RFC 7662)
//!
//! # Security Considerations
//!
//! - Introspection endpoint requires client authentication
//! - Never reveal why a token is inactive (expired vs revoked vs invalid)
//! - Always return valid JSON response
//!
//! # References
//!
//! - [RFC 7662 - OAuth 2.0 Token Introspection](https://tools.ietf.org/html/rfc7662)

use serde::{Deserialize, Serialize};

use crate::crypto::AccessTokenClaims;
use crate::types::TokenRecord;

// =============================================================================
// Request Types
// =============================================================================

/// Token introspection request per RFC 7662.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntrospectionRequest {
    /// The token to introspect.
    pub token: Option<String>,

    /// Optional hint about the token type.
    pub token_type_hint: Option<String>,

    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Token introspection response per RFC 7662.
///
/// If the token is invalid, expired, revoked, or unknown, the response
/// only contains `active: false`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct IntrospectionResponse {
    /// Per RFC 7662, this is the ONLY required field.
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// `access_token` or `refresh_token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Subject identifier (user or client ID).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Permissions embedded at issuance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl IntrospectionResponse {
    /// Creates an inactive response.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Active response for a verified access token.
    #[must_use]
    pub fn from_access_claims(claims: AccessTokenClaims) -> Self {
        Self {
            active: true,
            scope: Some(claims.scope),
            client_id: Some(claims.client_id),
            token_type: Some("access_token".to_string()),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            sub: Some(claims.sub),
            aud: claims.aud,
            iss: Some(claims.iss),
            jti: Some(claims.jti),
            permissions: claims.permissions,
        }
    }

    /// Active response for an opaque refresh token row.
    #[must_use]
    pub fn from_refresh_record(record: TokenRecord, issuer: &str) -> Self {
        let sub = record
            .user_id
            .clone()
            .unwrap_or_else(|| record.client_id.clone());
        Self {
            active: true,
            scope: Some(record.scope),
            client_id: Some(record.client_id),
            token_type: Some(record.kind.as_str().to_string()),
            exp: Some(record.expires_at.unix_timestamp()),
            iat: Some(record.issued_at.unix_timestamp()),
            sub: Some(sub),
            aud: None,
            iss: Some(issuer.to_string()),
            jti: Some(record.token_id),
            permissions: Vec::new(),
        }
    }
}
