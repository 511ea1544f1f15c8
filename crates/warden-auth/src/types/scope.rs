//! Scope metadata and scope-string helpers.

use serde::{Deserialize, Serialize};

/// A scope known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDefinition {
    /// The scope token as it appears in requests (e.g. `openid`).
    pub name: String,

    /// Text shown on consent screens.
    #[serde(default)]
    pub description: String,

    /// Inactive scopes are rejected as `invalid_scope`.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl ScopeDefinition {
    /// Creates an active scope definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            active: true,
        }
    }
}

/// Splits a space-delimited scope string, dropping duplicates and keeping
/// first-seen order.
#[must_use]
pub fn parse_scope(scope: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in scope.split_whitespace() {
        if !out.iter().any(|s| s == token) {
            out.push(token.to_string());
        }
    }
    out
}

/// Joins scopes into the space-delimited wire form.
#[must_use]
pub fn join_scope<S: AsRef<str>>(scopes: &[S]) -> String {
    scopes
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Checks the RFC 6749 `scope-token` grammar
/// (`%x21 / %x23-5B / %x5D-7E`, at least one character).
#[must_use]
pub fn is_valid_scope_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b == 0x21 || (0x23..=0x5B).contains(&b) || (0x5D..=0x7E).contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scope_dedupes_and_keeps_order() {
        assert_eq!(
            parse_scope("openid  profile openid email"),
            vec!["openid", "profile", "email"]
        );
        assert!(parse_scope("   ").is_empty());
    }

    #[test]
    fn test_join_scope() {
        assert_eq!(join_scope(&["openid", "profile"]), "openid profile");
        assert_eq!(join_scope::<&str>(&[]), "");
    }

    #[test]
    fn test_scope_token_grammar() {
        assert!(is_valid_scope_token("openid"));
        assert!(is_valid_scope_token("reports:read"));
        assert!(!is_valid_scope_token(""));
        assert!(!is_valid_scope_token("has\"quote"));
        assert!(!is_valid_scope_token("back\\slash"));
    }
}
