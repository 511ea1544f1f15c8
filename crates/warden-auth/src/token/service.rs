//! Token service for issuing, refreshing, introspecting and revoking tokens.
//!
//! - Authorization code exchange (with PKCE)
//! - Refresh token rotation
//! - Client credentials
//! - Introspection (RFC 7662) and revocation (RFC 7009)
//!
//! Access tokens are signed JWTs carrying the user's effective permissions
//! as resolved at issuance. Refresh tokens are opaque. Both get a
//! hash-indexed [`TokenRecord`] that revocation and replay checks consult.
//!
//! # Usage
//!
//! ```ignore
//! use warden_auth::token::{TokenConfig, TokenService};
//!
//! let service = TokenService::new(jwt, clients, codes, tokens, rbac, audit, config);
//! let credentials = ClientCredentials::new(auth_header, form.client_id, form.client_secret);
//! let response = service.token(&form, &credentials).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::AuthResult;
use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::config::AuthConfig;
use crate::crypto::{AccessTokenClaims, JwtService, generate_opaque_token, hash_token, verify_pkce};
use crate::error::AuthError;
use crate::oauth::client_auth::{ClientCredentials, authenticate_client};
use crate::oauth::token::{TokenRequest, TokenResponse};
use crate::rbac::RbacResolver;
use crate::storage::{AuthorizationCodeStorage, ClientStorage, TokenStorage};
use crate::types::{Client, GrantType, TokenKind, TokenRecord, join_scope, parse_scope};

use super::introspection::{IntrospectionRequest, IntrospectionResponse};
use super::revocation::{RevocationRequest, TokenTypeHint};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the token service.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Audience placed in access tokens, if any.
    pub audience: Option<String>,

    /// Default access token lifetime. Can be overridden per-client.
    pub access_token_lifetime: Duration,

    /// Default refresh token lifetime. Can be overridden per-client.
    pub refresh_token_lifetime: Duration,

    /// Whether to rotate refresh tokens on use.
    /// When true, the old token is revoked and a new one is issued.
    pub rotate_refresh_tokens: bool,

    /// Grants enabled server-wide.
    pub enabled_grants: Vec<GrantType>,

    /// Issue a refresh token with client_credentials access tokens.
    pub refresh_for_client_credentials: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            audience: None,
            access_token_lifetime: Duration::hours(1),
            refresh_token_lifetime: Duration::days(30),
            rotate_refresh_tokens: true,
            enabled_grants: vec![
                GrantType::AuthorizationCode,
                GrantType::RefreshToken,
                GrantType::ClientCredentials,
            ],
            refresh_for_client_credentials: false,
        }
    }
}

impl TokenConfig {
    /// Derives the service configuration from the server configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown grant type or a
    /// lifetime that does not fit.
    pub fn from_auth_config(config: &AuthConfig) -> AuthResult<Self> {
        let lifetime = |name: &str, value: std::time::Duration| {
            Duration::try_from(value)
                .map_err(|e| AuthError::configuration(format!("{name}: {e}")))
        };
        let enabled_grants = config
            .oauth
            .grant_types
            .iter()
            .map(|g| g.parse::<GrantType>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        Ok(Self {
            audience: config.audience.clone(),
            access_token_lifetime: lifetime(
                "access_token_lifetime",
                config.oauth.access_token_lifetime,
            )?,
            refresh_token_lifetime: lifetime(
                "refresh_token_lifetime",
                config.oauth.refresh_token_lifetime,
            )?,
            rotate_refresh_tokens: config.oauth.refresh_token_rotation,
            enabled_grants,
            refresh_for_client_credentials: config
                .oauth
                .issue_refresh_token_for_client_credentials,
        })
    }

    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn with_rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    #[must_use]
    pub fn with_refresh_for_client_credentials(mut self, enabled: bool) -> Self {
        self.refresh_for_client_credentials = enabled;
        self
    }

    fn is_grant_enabled(&self, grant: GrantType) -> bool {
        self.enabled_grants.contains(&grant)
    }
}

/// Counts from one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub codes: u64,
    pub tokens: u64,
}

/// A freshly minted token: the wire value and its row.
struct Minted {
    value: String,
    record: TokenRecord,
}

// =============================================================================
// Service
// =============================================================================

/// Token service for generating and managing OAuth tokens.
pub struct TokenService {
    jwt_service: Arc<JwtService>,
    client_storage: Arc<dyn ClientStorage>,
    code_storage: Arc<dyn AuthorizationCodeStorage>,
    token_storage: Arc<dyn TokenStorage>,
    rbac: RbacResolver,
    audit: Arc<dyn AuditSink>,
    config: TokenConfig,
}

impl TokenService {
    #[must_use]
    pub fn new(
        jwt_service: Arc<JwtService>,
        client_storage: Arc<dyn ClientStorage>,
        code_storage: Arc<dyn AuthorizationCodeStorage>,
        token_storage: Arc<dyn TokenStorage>,
        rbac: RbacResolver,
        audit: Arc<dyn AuditSink>,
        config: TokenConfig,
    ) -> Self {
        Self {
            jwt_service,
            client_storage,
            code_storage,
            token_storage,
            rbac,
            audit,
            config,
        }
    }

    /// Handles a token endpoint request.
    ///
    /// Emits exactly one audit event, success or failure.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `invalid_request` if `grant_type` or a grant-specific field is missing
    /// - `unsupported_grant_type` for an unknown or disabled grant
    /// - `invalid_client` if client authentication fails
    /// - `unauthorized_client` if the client may not use the grant
    /// - `invalid_grant` for a bad, used, expired or mismatched code or
    ///   refresh token, or a failed PKCE check
    /// - `invalid_scope` if a refresh widens or client_credentials matches
    ///   no allowed scope
    /// - a server error if storage, permission resolution or signing fails
    pub async fn token(
        &self,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> AuthResult<TokenResponse> {
        let grant_name = request.grant_type.as_deref().unwrap_or_default().to_string();
        let result = self.dispatch(request, credentials).await;

        let actor = credentials.claimed_client_id().unwrap_or_default();
        let event = match &result {
            Ok((grant, response)) => {
                let action = if *grant == GrantType::RefreshToken {
                    AuditAction::TokenRefreshed
                } else {
                    AuditAction::TokenIssued
                };
                AuditEvent::builder(action)
                    .client(actor)
                    .resource(format!("client:{actor}"))
                    .meta("grant_type", grant.as_str())
                    .meta("scope", response.scope.as_str())
                    .meta("refresh_token_issued", response.refresh_token.is_some())
            }
            Err(e) => {
                if e.is_server_error() {
                    tracing::error!(grant_type = %grant_name, error = %e, "Token request failed");
                } else {
                    tracing::debug!(grant_type = %grant_name, error = %e, "Token request rejected");
                }
                AuditEvent::builder(AuditAction::TokenRequestFailed)
                    .client(actor)
                    .resource(format!("client:{actor}"))
                    .failure(e)
                    .meta("grant_type", grant_name.as_str())
                    .meta("reason", e.to_string())
            }
        };
        self.audit.emit(event.build()).await;

        result.map(|(_, response)| response)
    }

    async fn dispatch(
        &self,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> AuthResult<(GrantType, TokenResponse)> {
        let grant_name = request
            .grant_type
            .as_deref()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| AuthError::invalid_request("Missing grant_type parameter"))?;
        let grant = grant_name
            .parse::<GrantType>()
            .ok()
            .filter(|g| self.config.is_grant_enabled(*g))
            .ok_or_else(|| AuthError::unsupported_grant_type(grant_name))?;

        let authenticated =
            authenticate_client(credentials, self.client_storage.as_ref()).await?;
        let client = authenticated.client;

        if !client.is_grant_type_allowed(grant) {
            return Err(AuthError::unauthorized_client(format!(
                "Client not authorized for {grant} grant"
            )));
        }

        let now = OffsetDateTime::now_utc();
        let response = match grant {
            GrantType::AuthorizationCode => self.exchange_code(request, &client, now).await?,
            GrantType::RefreshToken => self.refresh(request, &client, now).await?,
            GrantType::ClientCredentials => {
                self.client_credentials(request, &client, now).await?
            }
        };
        Ok((grant, response))
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Security
    ///
    /// - Binding, expiry and PKCE failures all surface as `invalid_grant`
    /// - The code is consumed in the same transaction that stores the tokens
    /// - Tokens are never logged
    async fn exchange_code(
        &self,
        request: &TokenRequest,
        client: &Client,
        now: OffsetDateTime,
    ) -> AuthResult<TokenResponse> {
        let code_value = required(&request.code, "code")?;
        let redirect_uri = required(&request.redirect_uri, "redirect_uri")?;

        let code = self
            .code_storage
            .find_by_code(code_value)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Unknown authorization code"))?;

        if code.used {
            tracing::warn!(client_id = %client.client_id, "Authorization code replay attempt");
            return Err(AuthError::invalid_grant("Authorization code already used"));
        }
        if code.is_expired_at(now) {
            return Err(AuthError::invalid_grant("Authorization code expired"));
        }
        if code.client_id != client.client_id {
            return Err(AuthError::invalid_grant(
                "Authorization code was issued to a different client",
            ));
        }
        if code.redirect_uri != redirect_uri {
            return Err(AuthError::invalid_grant("redirect_uri mismatch"));
        }

        match (&code.code_challenge, request.code_verifier.as_deref()) {
            (Some(challenge), Some(verifier)) => verify_pkce(challenge, verifier)?,
            (Some(_), None) => return Err(AuthError::invalid_grant("Missing code_verifier")),
            (None, Some(_)) => {
                return Err(AuthError::invalid_grant(
                    "code_verifier sent for a code issued without PKCE",
                ));
            }
            (None, None) => {}
        }

        let permissions = self
            .rbac
            .effective_permissions_at(&code.user_id, now)
            .await?
            .identifiers();

        let access = self.mint_access_token(
            client,
            Some(code.user_id.as_str()),
            &code.scope,
            permissions,
            code.nonce.clone(),
            now,
        )?;
        let refresh = (client.is_grant_type_allowed(GrantType::RefreshToken)
            && self.config.is_grant_enabled(GrantType::RefreshToken))
        .then(|| {
            let expires_at = now + client.refresh_token_lifetime(self.config.refresh_token_lifetime);
            mint_refresh_token(client, Some(code.user_id.as_str()), &code.scope, now, expires_at, None)
        });

        let mut records = vec![access.record.clone()];
        records.extend(refresh.iter().map(|r| r.record.clone()));

        if !self.code_storage.redeem(code_value, now, &records).await? {
            tracing::warn!(client_id = %client.client_id, "Authorization code lost redemption race");
            return Err(AuthError::invalid_grant("Authorization code already used"));
        }

        tracing::info!(
            client_id = %client.client_id,
            user_id = %code.user_id,
            "Exchanged authorization code"
        );

        Ok(self.response(client, access, refresh, code.scope))
    }

    /// Exchanges a refresh token for a new access token, rotating the
    /// refresh token when enabled.
    ///
    /// The scope can be narrowed but never widened.
    async fn refresh(
        &self,
        request: &TokenRequest,
        client: &Client,
        now: OffsetDateTime,
    ) -> AuthResult<TokenResponse> {
        let refresh_value = required(&request.refresh_token, "refresh_token")?;
        let old_hash = hash_token(refresh_value);

        let stored = self
            .token_storage
            .find_by_hash(&old_hash)
            .await?
            .filter(|t| t.kind == TokenKind::RefreshToken)
            .ok_or_else(|| AuthError::invalid_grant("Invalid refresh token"))?;

        if stored.client_id != client.client_id {
            return Err(AuthError::invalid_grant(
                "Refresh token was issued to a different client",
            ));
        }
        if stored.is_revoked() {
            tracing::warn!(
                client_id = %client.client_id,
                token_id = %stored.token_id,
                "Revoked refresh token presented"
            );
            return Err(AuthError::invalid_grant("Refresh token has been revoked"));
        }
        if stored.is_expired_at(now) {
            return Err(AuthError::invalid_grant("Refresh token has expired"));
        }

        let scope = narrow_scope(request.scope.as_deref(), &stored.scope)?;

        let permissions = match &stored.user_id {
            Some(user_id) => self
                .rbac
                .effective_permissions_at(user_id, now)
                .await?
                .identifiers(),
            None => Vec::new(),
        };

        let access = self.mint_access_token(
            client,
            stored.user_id.as_deref(),
            &scope,
            permissions,
            None,
            now,
        )?;

        let refresh = if self.config.rotate_refresh_tokens {
            // Rotation keeps the original absolute expiry.
            let rotated = mint_refresh_token(
                client,
                stored.user_id.as_deref(),
                &scope,
                now,
                stored.expires_at,
                Some(stored.token_id.clone()),
            );
            let records = [access.record.clone(), rotated.record.clone()];
            if !self
                .token_storage
                .rotate_refresh_token(&old_hash, now, &records)
                .await?
            {
                return Err(AuthError::invalid_grant("Refresh token has been revoked"));
            }
            Some(rotated)
        } else {
            self.token_storage
                .create(std::slice::from_ref(&access.record))
                .await?;
            None
        };

        tracing::info!(
            client_id = %client.client_id,
            rotated = refresh.is_some(),
            "Refreshed access token"
        );

        Ok(self.response(client, access, refresh, scope))
    }

    /// Issues a token to a confidential client acting on its own behalf.
    ///
    /// The requested scope is intersected with the client's allowed scopes;
    /// no scope requested means all of them.
    async fn client_credentials(
        &self,
        request: &TokenRequest,
        client: &Client,
        now: OffsetDateTime,
    ) -> AuthResult<TokenResponse> {
        if client.is_public() {
            return Err(AuthError::unauthorized_client(
                "client_credentials requires a confidential client",
            ));
        }

        let granted: Vec<String> = match request.scope.as_deref() {
            Some(requested) if !requested.trim().is_empty() => parse_scope(requested)
                .into_iter()
                .filter(|s| client.is_scope_allowed(s))
                .collect(),
            _ => client.allowed_scopes.clone(),
        };
        if granted.is_empty() {
            return Err(AuthError::invalid_scope(
                "None of the requested scopes are allowed for this client",
            ));
        }
        let scope = join_scope(&granted);

        let access = self.mint_access_token(client, None, &scope, Vec::new(), None, now)?;
        let refresh = (self.config.refresh_for_client_credentials
            && client.is_grant_type_allowed(GrantType::RefreshToken))
        .then(|| {
            let expires_at = now + client.refresh_token_lifetime(self.config.refresh_token_lifetime);
            mint_refresh_token(client, None, &scope, now, expires_at, None)
        });

        let mut records = vec![access.record.clone()];
        records.extend(refresh.iter().map(|r| r.record.clone()));
        self.token_storage.create(&records).await?;

        tracing::info!(client_id = %client.client_id, "Issued client_credentials token");

        Ok(self.response(client, access, refresh, scope))
    }

    fn mint_access_token(
        &self,
        client: &Client,
        user_id: Option<&str>,
        scope: &str,
        permissions: Vec<String>,
        nonce: Option<String>,
        now: OffsetDateTime,
    ) -> AuthResult<Minted> {
        let lifetime = client.access_token_lifetime(self.config.access_token_lifetime);
        let expires_at = now + lifetime;
        let jti = Uuid::new_v4().to_string();

        let claims = AccessTokenClaims {
            iss: self.jwt_service.issuer().to_string(),
            sub: user_id.unwrap_or(&client.client_id).to_string(),
            aud: self.config.audience.clone(),
            exp: expires_at.unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: jti.clone(),
            scope: scope.to_string(),
            client_id: client.client_id.clone(),
            permissions,
            nonce,
        };
        let value = self.jwt_service.encode(&claims)?;

        let record = TokenRecord {
            token_id: jti,
            token_hash: hash_token(&value),
            kind: TokenKind::AccessToken,
            client_id: client.client_id.clone(),
            user_id: user_id.map(str::to_string),
            scope: scope.to_string(),
            issued_at: now,
            expires_at,
            revoked_at: None,
            rotated_from: None,
        };
        Ok(Minted { value, record })
    }

    fn response(
        &self,
        client: &Client,
        access: Minted,
        refresh: Option<Minted>,
        scope: String,
    ) -> TokenResponse {
        let lifetime = client.access_token_lifetime(self.config.access_token_lifetime);
        let expires_in = u64::try_from(lifetime.whole_seconds()).unwrap_or_default();
        let response = TokenResponse::new(access.value, expires_in, scope);
        match refresh {
            Some(refresh) => response.with_refresh_token(refresh.value),
            None => response,
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Introspects a token on behalf of an authenticated client.
    ///
    /// Unknown, malformed, expired and revoked tokens all yield
    /// `{active: false}`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` if the caller fails authentication,
    /// `invalid_request` if `token` is missing, and a server error if a
    /// storage lookup fails.
    pub async fn introspect(
        &self,
        request: &IntrospectionRequest,
        credentials: &ClientCredentials,
    ) -> AuthResult<IntrospectionResponse> {
        let actor = credentials.claimed_client_id().unwrap_or_default().to_string();
        let result = self.introspect_inner(request, credentials).await;

        let event = AuditEvent::builder(AuditAction::TokenIntrospected)
            .client(actor.as_str())
            .resource(format!("client:{actor}"));
        let event = match &result {
            Ok(response) => event.meta("active", response.active),
            Err(e) => event.failure(e),
        };
        self.audit.emit(event.build()).await;

        result
    }

    async fn introspect_inner(
        &self,
        request: &IntrospectionRequest,
        credentials: &ClientCredentials,
    ) -> AuthResult<IntrospectionResponse> {
        authenticate_client(credentials, self.client_storage.as_ref()).await?;
        let token = required(&request.token, "token")?;
        let now = OffsetDateTime::now_utc();

        let hint = TokenTypeHint::parse(request.token_type_hint.as_deref());
        let order = match hint {
            Some(TokenTypeHint::RefreshToken) => {
                [TokenTypeHint::RefreshToken, TokenTypeHint::AccessToken]
            }
            _ => [TokenTypeHint::AccessToken, TokenTypeHint::RefreshToken],
        };

        for kind in order {
            let found = match kind {
                TokenTypeHint::AccessToken => self.introspect_access(token, now).await?,
                TokenTypeHint::RefreshToken => self.introspect_refresh(token, now).await?,
            };
            if let Some(response) = found {
                return Ok(response);
            }
        }
        Ok(IntrospectionResponse::inactive())
    }

    async fn introspect_access(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> AuthResult<Option<IntrospectionResponse>> {
        let Ok(data) = self.jwt_service.decode::<AccessTokenClaims>(token) else {
            return Ok(None);
        };
        let claims = data.claims;

        let record = self.token_storage.find_by_jti(&claims.jti).await?;
        let live = record.is_some_and(|r| {
            r.kind == TokenKind::AccessToken
                && r.is_active_at(now)
                && r.client_id == claims.client_id
        });
        Ok(live.then(|| IntrospectionResponse::from_access_claims(claims)))
    }

    async fn introspect_refresh(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> AuthResult<Option<IntrospectionResponse>> {
        let record = self.token_storage.find_by_hash(&hash_token(token)).await?;
        Ok(record
            .filter(|r| r.kind == TokenKind::RefreshToken && r.is_active_at(now))
            .map(|r| IntrospectionResponse::from_refresh_record(r, self.jwt_service.issuer())))
    }

    // =========================================================================
    // Revocation
    // =========================================================================

    /// Revokes a token on behalf of an authenticated client.
    ///
    /// Once the caller is authenticated this always succeeds: unknown
    /// tokens, already revoked tokens and tokens owned by another client
    /// are indistinguishable, and storage failures are logged and audited
    /// rather than returned.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` if the caller fails authentication and
    /// `invalid_request` if `token` is missing.
    pub async fn revoke(
        &self,
        request: &RevocationRequest,
        credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        let actor = credentials.claimed_client_id().unwrap_or_default().to_string();
        let event = AuditEvent::builder(AuditAction::TokenRevoked)
            .client(actor.as_str())
            .resource(format!("client:{actor}"));

        let client = match authenticate_client(credentials, self.client_storage.as_ref()).await
        {
            Ok(authenticated) => authenticated.client,
            Err(e) => {
                self.audit.emit(event.failure(&e).build()).await;
                return Err(e);
            }
        };
        let token = match required(&request.token, "token") {
            Ok(token) => token,
            Err(e) => {
                self.audit.emit(event.failure(&e).build()).await;
                return Err(e);
            }
        };

        let event = match self.revoke_owned(token, &client).await {
            Ok(revoked) => event.meta("revoked", revoked),
            Err(e) => {
                tracing::error!(client_id = %client.client_id, error = %e, "Token revocation failed");
                event.failure(&e)
            }
        };
        self.audit.emit(event.build()).await;
        Ok(())
    }

    /// Revokes the token if it exists and belongs to `client`.
    ///
    /// Access tokens that verify are revoked by `jti`; refresh tokens and
    /// anything else are looked up by hash.
    async fn revoke_owned(&self, token: &str, client: &Client) -> AuthResult<bool> {
        let now = OffsetDateTime::now_utc();

        if let Ok(data) = self.jwt_service.decode::<AccessTokenClaims>(token) {
            let jti = data.claims.jti;
            if let Some(record) = self.token_storage.find_by_jti(&jti).await?
                && record.kind == TokenKind::AccessToken
            {
                if !owned_by(&record, client) {
                    return Ok(false);
                }
                return self.token_storage.revoke_by_jti(&jti, now).await;
            }
        }

        let token_hash = hash_token(token);
        let Some(record) = self.token_storage.find_by_hash(&token_hash).await? else {
            return Ok(false);
        };
        if !owned_by(&record, client) {
            return Ok(false);
        }
        self.token_storage.revoke_by_hash(&token_hash, now).await
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Deletes expired authorization codes and tokens.
    ///
    /// Advisory only: every read path checks expiry itself.
    ///
    /// # Errors
    ///
    /// Returns an error if either storage sweep fails.
    pub async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<CleanupReport> {
        let result = async {
            Ok::<_, AuthError>(CleanupReport {
                codes: self.code_storage.cleanup_expired(now).await?,
                tokens: self.token_storage.cleanup_expired(now).await?,
            })
        }
        .await;

        let event = AuditEvent::builder(AuditAction::CleanupCompleted).resource("storage");
        let event = match &result {
            Ok(report) => event
                .meta("codes", report.codes)
                .meta("tokens", report.tokens),
            Err(e) => event.failure(e),
        };
        self.audit.emit(event.build()).await;

        result
    }

    #[must_use]
    pub fn jwt_service(&self) -> &Arc<JwtService> {
        &self.jwt_service
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }
}

fn owned_by(record: &TokenRecord, client: &Client) -> bool {
    if record.client_id == client.client_id {
        return true;
    }
    tracing::debug!(
        client_id = %client.client_id,
        "Ignoring revocation of a token owned by another client"
    );
    false
}

fn required<'a>(value: &'a Option<String>, name: &str) -> AuthResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::invalid_request(format!("Missing {name} parameter")))
}

fn mint_refresh_token(
    client: &Client,
    user_id: Option<&str>,
    scope: &str,
    now: OffsetDateTime,
    expires_at: OffsetDateTime,
    rotated_from: Option<String>,
) -> Minted {
    let value = generate_opaque_token();
    let record = TokenRecord {
        token_id: Uuid::new_v4().to_string(),
        token_hash: hash_token(&value),
        kind: TokenKind::RefreshToken,
        client_id: client.client_id.clone(),
        user_id: user_id.map(str::to_string),
        scope: scope.to_string(),
        issued_at: now,
        expires_at,
        revoked_at: None,
        rotated_from,
    };
    Minted { value, record }
}

/// Scope for a refreshed token: the original, or a subset of it.
fn narrow_scope(requested: Option<&str>, original: &str) -> AuthResult<String> {
    match requested.filter(|r| !r.trim().is_empty()) {
        None => Ok(original.to_string()),
        Some(requested) => {
            let original_scopes: HashSet<&str> = original.split_whitespace().collect();
            let requested_scopes = parse_scope(requested);
            if !requested_scopes
                .iter()
                .all(|s| original_scopes.contains(s.as_str()))
            {
                return Err(AuthError::invalid_scope(
                    "Requested scope exceeds original grant",
                ));
            }
            Ok(join_scope(&requested_scopes))
        }
    }
}
