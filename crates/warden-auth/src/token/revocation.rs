//! Token revocation (RFC 7009)
//!
//! # Security Considerations
//!
//! - Revocation endpoint always returns 200 OK once the caller is
//!   authenticated (don't reveal token existence)
//! - Client must own the token to revoke it; anything else is silently
//!   ignored
//!
//! # References
//!
//! - [RFC 7009 - OAuth 2.0 Token Revocation](https://tools.ietf.org/html/rfc7009)

use serde::{Deserialize, Serialize};

use crate::types::TokenKind;

/// Token revocation request per RFC 7009.
///
/// `token` is optional here so that its absence is reported as
/// `invalid_request` rather than a form rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RevocationRequest {
    /// The token to revoke.
    pub token: Option<String>,

    /// Optional hint about the token type. Unknown values are ignored.
    pub token_type_hint: Option<String>,

    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Token type hint for revocation and introspection requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// The token is an access token.
    AccessToken,
    /// The token is a refresh token.
    RefreshToken,
}

impl TokenTypeHint {
    /// Parses a hint, returning `None` for anything unrecognised.
    ///
    /// Per RFC 7009 the server may ignore a hint it does not understand
    /// and search all token types.
    #[must_use]
    pub fn parse(hint: Option<&str>) -> Option<Self> {
        match hint? {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }

    /// Returns the token type hint as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<TokenKind> for TokenTypeHint {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::AccessToken => Self::AccessToken,
            TokenKind::RefreshToken => Self::RefreshToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hint() {
        assert_eq!(
            TokenTypeHint::parse(Some("access_token")),
            Some(TokenTypeHint::AccessToken)
        );
        assert_eq!(
            TokenTypeHint::parse(Some("refresh_token")),
            Some(TokenTypeHint::RefreshToken)
        );
        assert_eq!(TokenTypeHint::parse(Some("id_token")), None);
        assert_eq!(TokenTypeHint::parse(None), None);
    }

    #[test]
    fn test_hint_display() {
        assert_eq!(TokenTypeHint::RefreshToken.to_string(), "refresh_token");
        assert_eq!(
            TokenTypeHint::from(TokenKind::AccessToken),
            TokenTypeHint::AccessToken
        );
    }
}
