//! Authorization server configuration.
//!
//! All sections deserialize with `serde(default)`, so a partial TOML file (or
//! none at all) yields a working development configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AuthError;

/// Root authorization server configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
///
/// [auth.oauth]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "30d"
///
/// [auth.signing]
/// algorithm = "RS256"
/// private_key_path = "/etc/warden/signing.pem"
/// public_key_path = "/etc/warden/signing.pub.pem"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL (used in the token `iss` claim and discovery).
    pub issuer: String,

    /// Audience placed in the access token `aud` claim, if any.
    pub audience: Option<String>,

    /// OAuth 2.0 grant and lifetime configuration.
    pub oauth: OAuthConfig,

    /// Token signing configuration.
    pub signing: SigningConfig,

    /// Login/consent hand-off to the hosting layer.
    pub interaction: InteractionConfig,

    /// Audit emission configuration.
    pub audit: AuditConfig,

    /// Periodic removal of expired codes and tokens.
    pub cleanup: CleanupConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            audience: None,
            oauth: OAuthConfig::default(),
            signing: SigningConfig::default(),
            interaction: InteractionConfig::default(),
            audit: AuditConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

/// OAuth 2.0 configuration.
///
/// Lifetimes here are server defaults; a client's own `token_lifetimes`
/// override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Rotate refresh tokens on use.
    pub refresh_token_rotation: bool,

    /// Grant types enabled server-wide.
    /// Supported: "authorization_code", "client_credentials", "refresh_token"
    pub grant_types: Vec<String>,

    /// Issue a refresh token alongside client_credentials access tokens.
    pub issue_refresh_token_for_client_credentials: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(600),
            access_token_lifetime: Duration::from_secs(3600),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600),
            refresh_token_rotation: true,
            grant_types: vec![
                "authorization_code".to_string(),
                "client_credentials".to_string(),
                "refresh_token".to_string(),
            ],
            issue_refresh_token_for_client_credentials: false,
        }
    }
}

/// Token signing configuration.
///
/// The algorithm is chosen once for the whole server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Signing algorithm: "HS256" or "RS256".
    pub algorithm: String,

    /// Shared secret for HS256. When absent an ephemeral secret is generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// PEM file holding the RS256 private key (PKCS#8).
    pub private_key_path: Option<String>,

    /// PEM file holding the RS256 public key (SPKI).
    pub public_key_path: Option<String>,

    /// Key ID placed in the JWT header and JWKS.
    pub key_id: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
            secret: None,
            private_key_path: None,
            public_key_path: None,
            key_id: None,
        }
    }
}

/// Where the hosting layer handles end-user login and consent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Login page. The original authorize URL is passed as `return_to`.
    pub login_url: Option<String>,

    /// Consent page. Receives the original authorize parameters.
    pub consent_url: Option<String>,

    /// Header carrying the authenticated user id, set by a trusted upstream.
    pub session_header: String,

    /// Honour `session_header`. Only enable behind a proxy that strips it
    /// from client requests.
    pub trust_session_header: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            login_url: None,
            consent_url: None,
            session_header: "x-authenticated-user".to_string(),
            trust_session_header: false,
        }
    }
}

/// Audit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Emit audit events to the tracing sink.
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Expired record cleanup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Run the periodic sweep.
    pub enabled: bool,

    /// Time between sweeps.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(300),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        AuthError::configuration(err.to_string())
    }
}

/// Minimum HS256 secret length in bytes (RFC 7518 section 3.2).
pub const MIN_HMAC_SECRET_LEN: usize = 32;

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is empty or not an absolute URL
    /// - The signing algorithm is not HS256 or RS256
    /// - An HS256 secret is shorter than 32 bytes
    /// - Only one of the RS256 key paths is set
    /// - An unknown grant type is listed
    /// - Any lifetime is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }
        url::Url::parse(&self.issuer).map_err(|e| {
            ConfigError::InvalidValue(format!("issuer must be an absolute URL: {e}"))
        })?;

        match self.signing.algorithm.as_str() {
            "HS256" => {
                if let Some(secret) = &self.signing.secret
                    && secret.len() < MIN_HMAC_SECRET_LEN
                {
                    return Err(ConfigError::InvalidValue(format!(
                        "signing.secret must be at least {MIN_HMAC_SECRET_LEN} bytes"
                    )));
                }
            }
            "RS256" => {
                if self.signing.private_key_path.is_some() != self.signing.public_key_path.is_some()
                {
                    return Err(ConfigError::Missing(
                        "signing.private_key_path and signing.public_key_path must be set together"
                            .to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid signing algorithm: '{other}'. Must be HS256 or RS256"
                )));
            }
        }

        for grant in &self.oauth.grant_types {
            match grant.as_str() {
                "authorization_code" | "client_credentials" | "refresh_token" => {}
                other => {
                    return Err(ConfigError::InvalidValue(format!(
                        "Invalid grant type: '{other}'. Must be authorization_code, client_credentials, or refresh_token"
                    )));
                }
            }
        }

        let lifetimes = [
            (
                "oauth.authorization_code_lifetime",
                self.oauth.authorization_code_lifetime,
            ),
            (
                "oauth.access_token_lifetime",
                self.oauth.access_token_lifetime,
            ),
            (
                "oauth.refresh_token_lifetime",
                self.oauth.refresh_token_lifetime,
            ),
        ];
        for (name, value) in lifetimes {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if self.cleanup.enabled && self.cleanup.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "cleanup.interval must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns `true` if the grant type is enabled server-wide.
    #[must_use]
    pub fn is_grant_enabled(&self, grant_type: &str) -> bool {
        self.oauth.grant_types.iter().any(|g| g == grant_type)
    }
}
