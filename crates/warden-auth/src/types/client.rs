//! OAuth 2.0 client registration types.
//!
//! A [`Client`] is provisioned by an administrator and read by every protocol
//! operation. Its identity (`client_id`, `client_type`) is fixed at creation;
//! the remaining configuration changes only through [`ClientUpdate`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Duration;

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow (with PKCE).
    AuthorizationCode,
    /// Refresh Token flow.
    RefreshToken,
    /// Client Credentials flow (confidential clients only).
    ClientCredentials,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::ClientCredentials => "client_credentials",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = ClientValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            "client_credentials" => Ok(Self::ClientCredentials),
            other => Err(ClientValidationError::UnknownGrantType(other.to_string())),
        }
    }
}

// =============================================================================
// Client Type
// =============================================================================

/// Client type per RFC 6749 section 2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// Cannot keep a secret (SPA, native app). PKCE is mandatory.
    #[serde(alias = "PUBLIC")]
    Public,
    /// Holds a secret and authenticates at the token endpoint.
    #[serde(alias = "CONFIDENTIAL")]
    Confidential,
}

impl ClientType {
    /// Returns the wire name of the client type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Confidential => "confidential",
        }
    }
}

// =============================================================================
// Token Lifetimes
// =============================================================================

/// Per-client lifetime overrides, in seconds.
///
/// A `None` field falls back to the server default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenLifetimes {
    /// Access token lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<u64>,
    /// Refresh token lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<u64>,
    /// Authorization code lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u64>,
}

impl TokenLifetimes {
    fn validate(&self) -> Result<(), ClientValidationError> {
        for (name, value) in [
            ("access", self.access),
            ("refresh", self.refresh),
            ("code", self.code),
        ] {
            if value == Some(0) {
                return Err(ClientValidationError::InvalidLifetime(name.to_string()));
            }
        }
        Ok(())
    }
}

fn seconds_or(value: Option<u64>, default: Duration) -> Duration {
    value
        .and_then(|secs| i64::try_from(secs).ok())
        .map(Duration::seconds)
        .unwrap_or(default)
}

// =============================================================================
// Client
// =============================================================================

/// OAuth 2.0 client registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Public, unique client identifier.
    pub client_id: String,

    /// Argon2 PHC hash of the client secret (confidential clients only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_hash: Option<String>,

    /// Public or confidential.
    pub client_type: ClientType,

    /// Human-readable display name.
    #[serde(default)]
    pub name: String,

    /// Registered redirect URIs, compared by exact string match.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Grant types this client may use.
    pub grant_types: Vec<GrantType>,

    /// Scopes this client may request. Empty means none.
    #[serde(default)]
    pub allowed_scopes: Vec<String>,

    /// Require PKCE even though the client is confidential.
    #[serde(default)]
    pub require_pkce: bool,

    /// Inactive clients fail every operation with `invalid_client`.
    pub active: bool,

    /// Lifetime overrides.
    #[serde(default)]
    pub token_lifetimes: TokenLifetimes,
}

impl Client {
    /// Validates the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is invalid.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        if self.client_type == ClientType::Public
            && self.grant_types.contains(&GrantType::ClientCredentials)
        {
            return Err(ClientValidationError::PublicClientCredentials);
        }

        if self.client_type == ClientType::Confidential && self.client_secret_hash.is_none() {
            return Err(ClientValidationError::MissingSecret);
        }

        if self.grant_types.contains(&GrantType::AuthorizationCode) && self.redirect_uris.is_empty()
        {
            return Err(ClientValidationError::NoRedirectUris);
        }

        validate_redirect_uris(&self.redirect_uris)?;
        validate_scopes(&self.allowed_scopes)?;
        self.token_lifetimes.validate()
    }

    /// Returns `true` for public clients.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.client_type == ClientType::Public
    }

    /// Checks if the given redirect URI is registered (exact match).
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks if the given scope is allowed for this client.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.allowed_scopes.iter().any(|allowed| allowed == scope)
    }

    /// Checks if the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Returns whether PKCE is required for this client.
    ///
    /// Always true for public clients.
    #[must_use]
    pub fn requires_pkce(&self) -> bool {
        self.is_public() || self.require_pkce
    }

    /// Access token lifetime, falling back to `default`.
    #[must_use]
    pub fn access_token_lifetime(&self, default: Duration) -> Duration {
        seconds_or(self.token_lifetimes.access, default)
    }

    /// Refresh token lifetime, falling back to `default`.
    #[must_use]
    pub fn refresh_token_lifetime(&self, default: Duration) -> Duration {
        seconds_or(self.token_lifetimes.refresh, default)
    }

    /// Authorization code lifetime, falling back to `default`.
    #[must_use]
    pub fn code_lifetime(&self, default: Duration) -> Duration {
        seconds_or(self.token_lifetimes.code, default)
    }

    /// Applies an update, validating each provided field independently.
    ///
    /// The client is left untouched if any field is rejected.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn apply_update(&mut self, update: &ClientUpdate) -> Result<(), ClientValidationError> {
        let mut next = self.clone();

        if let Some(uris) = &update.redirect_uris {
            validate_redirect_uris(uris)?;
            next.redirect_uris = uris.clone();
        }
        if let Some(grants) = &update.grant_types {
            next.grant_types = grants.clone();
        }
        if let Some(scopes) = &update.allowed_scopes {
            validate_scopes(scopes)?;
            next.allowed_scopes = scopes.clone();
        }
        if let Some(require_pkce) = update.require_pkce {
            next.require_pkce = require_pkce;
        }
        if let Some(active) = update.active {
            next.active = active;
        }
        if let Some(lifetimes) = update.token_lifetimes {
            lifetimes.validate()?;
            next.token_lifetimes = lifetimes;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn validate_redirect_uris(uris: &[String]) -> Result<(), ClientValidationError> {
    for uri in uris {
        let parsed = url::Url::parse(uri)
            .map_err(|_| ClientValidationError::InvalidRedirectUri(uri.clone()))?;
        if parsed.fragment().is_some() {
            return Err(ClientValidationError::InvalidRedirectUri(uri.clone()));
        }
    }
    Ok(())
}

fn validate_scopes(scopes: &[String]) -> Result<(), ClientValidationError> {
    for scope in scopes {
        if scope.is_empty() || scope.chars().any(char::is_whitespace) {
            return Err(ClientValidationError::InvalidScope(scope.clone()));
        }
    }
    Ok(())
}

// =============================================================================
// Client Update
// =============================================================================

/// The closed set of client fields an administrator may change.
///
/// Unknown fields are rejected at deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientUpdate {
    /// Replacement redirect URI set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    /// Replacement grant type set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<GrantType>>,
    /// Replacement allowed scope set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_scopes: Option<Vec<String>>,
    /// New PKCE requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_pkce: Option<bool>,
    /// New active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Replacement lifetime overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_lifetimes: Option<TokenLifetimes>,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Errors that can occur during client validation.
#[derive(Debug, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// At least one grant type is required.
    #[error("At least one grant type is required")]
    NoGrantTypes,

    /// Public clients cannot use client_credentials grant.
    #[error("Public clients cannot use client_credentials grant")]
    PublicClientCredentials,

    /// Authorization code flow requires redirect URIs.
    #[error("Authorization code flow requires redirect URIs")]
    NoRedirectUris,

    /// Confidential clients require a client secret.
    #[error("Confidential clients require a client secret")]
    MissingSecret,

    /// Redirect URI is not an absolute URI without fragment.
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Scope name is empty or contains whitespace.
    #[error("Invalid scope name: '{0}'")]
    InvalidScope(String),

    /// Unknown grant type name.
    #[error("Unknown grant type: {0}")]
    UnknownGrantType(String),

    /// Lifetime override of zero.
    #[error("Token lifetime '{0}' must be > 0")]
    InvalidLifetime(String),
}

// =============================================================================
// Tests
// =============================================================================
