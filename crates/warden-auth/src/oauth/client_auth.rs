//! Client authentication for the token, introspection and revocation
//! endpoints.
//!
//! # Authentication Methods
//!
//! - `none` - Public clients (client_id only)
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in the request body
//!
//! Every failure is `invalid_client` with the same public description, so a
//! caller cannot tell an unknown client from a wrong secret.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::crypto::{burn_secret_verification, verify_client_secret};
use crate::error::AuthError;
use crate::storage::ClientStorage;
use crate::types::Client;

/// Result of successful client authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    pub client: Client,
    pub auth_method: TokenEndpointAuthMethod,
}

/// Token endpoint authentication methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    None,
    ClientSecretBasic,
    ClientSecretPost,
}

impl TokenEndpointAuthMethod {
    /// All supported methods, as advertised in discovery.
    pub const ALL: [Self; 3] = [Self::ClientSecretBasic, Self::ClientSecretPost, Self::None];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
        }
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials presented by a client on one request.
#[derive(Debug, Clone, Default)]
pub struct ClientCredentials {
    /// Decoded `Authorization: Basic` credentials.
    pub basic: Option<(String, String)>,
    /// `client_id` from the body.
    pub client_id: Option<String>,
    /// `client_secret` from the body.
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    /// Collects credentials from the `Authorization` header value and body
    /// fields.
    #[must_use]
    pub fn new(
        authorization: Option<&str>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            basic: authorization.and_then(parse_basic_auth),
            client_id,
            client_secret,
        }
    }

    /// The client id the caller claims, for audit records.
    #[must_use]
    pub fn claimed_client_id(&self) -> Option<&str> {
        self.basic
            .as_ref()
            .map(|(id, _)| id.as_str())
            .or(self.client_id.as_deref())
    }
}

/// Authenticates a client from presented credentials.
///
/// Methods are tried in order: Basic, client_secret_post, public.
///
/// # Errors
///
/// Returns `invalid_client` if:
/// - No client credentials are provided
/// - The client is unknown or inactive
/// - The secret is wrong
/// - A confidential client presents no secret
/// - A public client presents a secret
/// - The body `client_id` disagrees with the Basic credentials
///
/// Returns `invalid_request` if a secret is sent both ways, and a storage
/// error if the lookup fails.
pub async fn authenticate_client(
    credentials: &ClientCredentials,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    if let Some((client_id, client_secret)) = &credentials.basic {
        if credentials.client_secret.is_some() {
            return Err(AuthError::invalid_request(
                "client credentials must not be sent in both the header and the body",
            ));
        }
        if let Some(body_id) = &credentials.client_id
            && body_id != client_id
        {
            return Err(AuthError::invalid_client("client_id mismatch"));
        }
        return authenticate_with_secret(
            client_id,
            client_secret,
            TokenEndpointAuthMethod::ClientSecretBasic,
            client_storage,
        )
        .await;
    }

    if let (Some(client_id), Some(client_secret)) =
        (&credentials.client_id, &credentials.client_secret)
    {
        return authenticate_with_secret(
            client_id,
            client_secret,
            TokenEndpointAuthMethod::ClientSecretPost,
            client_storage,
        )
        .await;
    }

    if let Some(client_id) = &credentials.client_id {
        return authenticate_public(client_id, client_storage).await;
    }

    Err(AuthError::invalid_client("No client credentials provided"))
}

async fn find_active(client_id: &str, client_storage: &dyn ClientStorage) -> AuthResult<Client> {
    let client = client_storage
        .find_by_client_id(client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

    if !client.active {
        return Err(AuthError::invalid_client("Client is inactive"));
    }
    Ok(client)
}

async fn authenticate_with_secret(
    client_id: &str,
    client_secret: &str,
    auth_method: TokenEndpointAuthMethod,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    // Every invalid_client rejection below costs one Argon2 verification.
    let client = match find_active(client_id, client_storage).await {
        Ok(client) => client,
        Err(e) => {
            if !e.is_server_error() {
                burn_secret_verification(client_secret);
            }
            return Err(e);
        }
    };

    if client.is_public() {
        burn_secret_verification(client_secret);
        return Err(AuthError::invalid_client(
            "Public clients cannot authenticate with a secret",
        ));
    }

    let Some(hash) = client.client_secret_hash.as_deref() else {
        burn_secret_verification(client_secret);
        return Err(AuthError::invalid_client("Client has no secret"));
    };
    if !verify_client_secret(client_secret, hash) {
        return Err(AuthError::invalid_client("Invalid client secret"));
    }

    Ok(AuthenticatedClient {
        client,
        auth_method,
    })
}

async fn authenticate_public(
    client_id: &str,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    let client = find_active(client_id, client_storage).await?;

    if !client.is_public() {
        return Err(AuthError::invalid_client(
            "Confidential clients must provide client credentials",
        ));
    }

    Ok(AuthenticatedClient {
        client,
        auth_method: TokenEndpointAuthMethod::None,
    })
}

/// Parses an HTTP Basic Auth header value.
///
/// Returns `Some((client_id, client_secret))` if valid, `None` otherwise.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // Split on first colon (secret may contain colons)
    let (client_id, client_secret) = credentials.split_once(':')?;
    if client_id.is_empty() {
        return None;
    }

    Some((client_id.to_string(), client_secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_client_secret;
    use crate::types::{ClientType, ClientUpdate, GrantType, TokenLifetimes};
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::collections::HashMap;
    use std::sync::RwLock;

    struct MockClientStorage {
        clients: RwLock<HashMap<String, Client>>,
    }

    impl MockClientStorage {
        fn new() -> Self {
            Self {
                clients: RwLock::new(HashMap::new()),
            }
        }

        fn add(&self, client: Client) {
            self.clients
                .write()
                .unwrap()
                .insert(client.client_id.clone(), client);
        }
    }

    #[async_trait]
    impl ClientStorage for MockClientStorage {
        async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
            Ok(self.clients.read().unwrap().get(client_id).cloned())
        }

        async fn create(&self, client: &Client) -> AuthResult<Client> {
            self.add(client.clone());
            Ok(client.clone())
        }

        async fn update(&self, client_id: &str, update: &ClientUpdate) -> AuthResult<Client> {
            let mut clients = self.clients.write().unwrap();
            let client = clients
                .get_mut(client_id)
                .ok_or_else(|| AuthError::invalid_request("no such client"))?;
            client
                .apply_update(update)
                .map_err(|e| AuthError::invalid_request(e.to_string()))?;
            Ok(client.clone())
        }

        async fn list(&self) -> AuthResult<Vec<Client>> {
            Ok(self.clients.read().unwrap().values().cloned().collect())
        }
    }

    fn public_client() -> Client {
        Client {
            client_id: "spa".to_string(),
            client_secret_hash: None,
            client_type: ClientType::Public,
            name: "SPA".to_string(),
            redirect_uris: vec!["https://spa.test/cb".to_string()],
            grant_types: vec![GrantType::AuthorizationCode],
            allowed_scopes: vec!["openid".to_string()],
            require_pkce: false,
            active: true,
            token_lifetimes: TokenLifetimes::default(),
        }
    }

    fn confidential_client() -> Client {
        Client {
            client_id: "backend".to_string(),
            client_secret_hash: Some(hash_client_secret("s3cret").unwrap()),
            client_type: ClientType::Confidential,
            name: "Backend".to_string(),
            redirect_uris: vec!["https://backend.test/cb".to_string()],
            grant_types: vec![GrantType::AuthorizationCode, GrantType::ClientCredentials],
            allowed_scopes: vec!["openid".to_string()],
            require_pkce: false,
            active: true,
            token_lifetimes: TokenLifetimes::default(),
        }
    }

    fn storage() -> MockClientStorage {
        let storage = MockClientStorage::new();
        storage.add(public_client());
        storage.add(confidential_client());
        storage
    }

    fn basic(id: &str, secret: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
    }

    #[tokio::test]
    async fn test_authenticate_public_client() {
        let creds = ClientCredentials::new(None, Some("spa".to_string()), None);
        let result = authenticate_client(&creds, &storage()).await.unwrap();
        assert_eq!(result.client.client_id, "spa");
        assert_eq!(result.auth_method, TokenEndpointAuthMethod::None);
    }

    #[tokio::test]
    async fn test_authenticate_basic_auth() {
        let header = basic("backend", "s3cret");
        let creds = ClientCredentials::new(Some(&header), None, None);
        let result = authenticate_client(&creds, &storage()).await.unwrap();
        assert_eq!(result.auth_method, TokenEndpointAuthMethod::ClientSecretBasic);
    }

    #[tokio::test]
    async fn test_authenticate_secret_post() {
        let creds = ClientCredentials::new(
            None,
            Some("backend".to_string()),
            Some("s3cret".to_string()),
        );
        let result = authenticate_client(&creds, &storage()).await.unwrap();
        assert_eq!(result.auth_method, TokenEndpointAuthMethod::ClientSecretPost);
    }

    #[tokio::test]
    async fn test_failures_are_indistinguishable() {
        let storage = storage();
        let wrong_secret = ClientCredentials::new(Some(&basic("backend", "nope")), None, None);
        let unknown = ClientCredentials::new(Some(&basic("ghost", "s3cret")), None, None);

        let e1 = authenticate_client(&wrong_secret, &storage)
            .await
            .unwrap_err();
        let e2 = authenticate_client(&unknown, &storage).await.unwrap_err();
        assert_eq!(e1.oauth_error_code(), "invalid_client");
        assert_eq!(e2.oauth_error_code(), "invalid_client");
        assert_eq!(e1.public_description(), e2.public_description());
        assert_eq!(e1.http_status(), 401);
    }

    #[tokio::test]
    async fn test_unknown_client_pays_for_a_hash_check() {
        let storage = storage();
        let wrong_secret = ClientCredentials::new(Some(&basic("backend", "nope")), None, None);
        let unknown = ClientCredentials::new(Some(&basic("ghost", "nope")), None, None);

        // Warm up the placeholder hash so neither timing includes building it.
        authenticate_client(&unknown, &storage).await.unwrap_err();

        let started = std::time::Instant::now();
        authenticate_client(&wrong_secret, &storage).await.unwrap_err();
        let wrong_secret_took = started.elapsed();

        let started = std::time::Instant::now();
        authenticate_client(&unknown, &storage).await.unwrap_err();
        let unknown_took = started.elapsed();

        assert!(
            unknown_took * 4 >= wrong_secret_took,
            "unknown client answered in {unknown_took:?}, wrong secret in {wrong_secret_took:?}"
        );
    }

    #[tokio::test]
    async fn test_inactive_client_rejected() {
        let storage = storage();
        let mut client = confidential_client();
        client.active = false;
        storage.add(client);

        let creds = ClientCredentials::new(Some(&basic("backend", "s3cret")), None, None);
        let err = authenticate_client(&creds, &storage).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_confidential_client_requires_secret() {
        let creds = ClientCredentials::new(None, Some("backend".to_string()), None);
        let err = authenticate_client(&creds, &storage()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_public_client_cannot_use_secret() {
        let creds = ClientCredentials::new(Some(&basic("spa", "anything")), None, None);
        let err = authenticate_client(&creds, &storage()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_body_client_id_must_match_basic() {
        let header = basic("backend", "s3cret");
        let creds = ClientCredentials::new(Some(&header), Some("spa".to_string()), None);
        let err = authenticate_client(&creds, &storage()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_secret_in_header_and_body_rejected() {
        let header = basic("backend", "s3cret");
        let creds = ClientCredentials::new(Some(&header), None, Some("s3cret".to_string()));
        let err = authenticate_client(&creds, &storage()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_no_credentials() {
        let err = authenticate_client(&ClientCredentials::default(), &storage())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[test]
    fn test_parse_basic_auth() {
        assert_eq!(
            parse_basic_auth(&basic("id", "pa:ss")),
            Some(("id".to_string(), "pa:ss".to_string()))
        );
        assert!(parse_basic_auth("Bearer abc").is_none());
        assert!(parse_basic_auth("Basic !!!").is_none());
        assert!(parse_basic_auth(&format!("Basic {}", STANDARD.encode("nocolon"))).is_none());
    }

    #[test]
    fn test_claimed_client_id() {
        let header = basic("backend", "x");
        let creds = ClientCredentials::new(Some(&header), Some("other".to_string()), None);
        assert_eq!(creds.claimed_client_id(), Some("backend"));
        let creds = ClientCredentials::new(None, Some("spa".to_string()), None);
        assert_eq!(creds.claimed_client_id(), Some("spa"));
    }
}
