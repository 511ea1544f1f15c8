//! OAuth authorization service.
//!
//! Validates an authorization request end to end and issues a one-time
//! authorization code. The checks run in a fixed order and each one
//! short-circuits:
//!
//! ```text
//! 1. structure (required params, response_type)   ─► Fatal
//! 2. client exists and is active                  ─► Fatal
//! 3. redirect_uri exactly registered              ─► Fatal
//! 4. PKCE (S256 only)                             ─► redirect error=invalid_request
//! 5. scopes active and allowed                    ─► redirect error=invalid_scope
//! 6. end-user session                             ─► NeedsLogin
//! 7. consent covers the scopes                    ─► NeedsConsent
//! 8. code issued                                  ─► redirect code=...
//! ```
//!
//! Nothing is redirected before step 3 passes, and once it has, `state` is
//! echoed on every redirect.
//!
//! # Security
//!
//! - Never log the authorization code or state parameter
//! - Redirect URI must exactly match a registered URI
//! - Plain PKCE is rejected

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::AuthResult;
use crate::audit::{AuditAction, AuditEvent, AuditEventBuilder, AuditSink};
use crate::config::AuthConfig;
use crate::consent::ConsentManager;
use crate::crypto::{PkceChallenge, PkceChallengeMethod, generate_opaque_token};
use crate::error::AuthError;
use crate::oauth::authorize::{
    AuthorizationErrorResponse, AuthorizationRequest, AuthorizationResponse,
};
use crate::oauth::session::RequestContext;
use crate::storage::{AuthorizationCodeStorage, ClientStorage, ScopeStorage};
use crate::types::{AuthorizationCode, Client, GrantType, is_valid_scope_token, join_scope, parse_scope};

// =============================================================================
// Outcome
// =============================================================================

/// An authorization request that validated but is waiting on the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub client_id: String,
    pub client_name: String,
    pub redirect_uri: String,
    /// Requested scopes, deduplicated, in request order.
    pub scopes: Vec<String>,
    pub state: Option<String>,
}

impl PendingAuthorization {
    /// Space-delimited scope string.
    #[must_use]
    pub fn scope(&self) -> String {
        join_scope(&self.scopes)
    }
}

/// Result of [`AuthorizationService::authorize`].
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// Redirect carrying `code` (and `state`).
    Code {
        location: String,
        client_id: String,
        scope: String,
    },

    /// Redirect carrying `error`, `error_description` (and `state`).
    Error { location: String, error: AuthError },

    /// No authenticated end user; the hosting layer must log one in and
    /// resume with the same parameters.
    NeedsLogin(PendingAuthorization),

    /// The user has not approved every requested scope for this client.
    NeedsConsent(PendingAuthorization),

    /// The redirect target is not trusted; answer directly.
    Fatal(AuthError),
}

impl AuthorizeOutcome {
    /// Redirect target, for the two redirect branches.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Code { location, .. } | Self::Error { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Returns `true` if a code was issued.
    #[must_use]
    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code { .. })
    }

    /// The OAuth error carried by the outcome, if any.
    #[must_use]
    pub fn error(&self) -> Option<&AuthError> {
        match self {
            Self::Error { error, .. } | Self::Fatal(error) => Some(error),
            _ => None,
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the authorization service.
#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    /// Authorization code lifetime, unless the client overrides it.
    /// Default: 10 minutes.
    pub code_lifetime: Duration,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            code_lifetime: Duration::minutes(10),
        }
    }
}

impl AuthorizationConfig {
    /// Derives the service configuration from the server configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the lifetime does not fit.
    pub fn from_auth_config(config: &AuthConfig) -> AuthResult<Self> {
        let code_lifetime = Duration::try_from(config.oauth.authorization_code_lifetime)
            .map_err(|e| AuthError::configuration(format!("authorization_code_lifetime: {e}")))?;
        Ok(Self { code_lifetime })
    }

    #[must_use]
    pub fn with_code_lifetime(mut self, lifetime: Duration) -> Self {
        self.code_lifetime = lifetime;
        self
    }
}

// =============================================================================
// Service
// =============================================================================

/// Validated request up to and including step 5.
struct ValidatedRequest {
    client: Client,
    redirect_uri: String,
    scopes: Vec<String>,
    state: Option<String>,
}

impl ValidatedRequest {
    fn pending(&self) -> PendingAuthorization {
        PendingAuthorization {
            client_id: self.client.client_id.clone(),
            client_name: self.client.name.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scopes: self.scopes.clone(),
            state: self.state.clone(),
        }
    }
}

/// Authorization service for handling OAuth 2.0 authorization requests.
pub struct AuthorizationService {
    client_storage: Arc<dyn ClientStorage>,
    scope_storage: Arc<dyn ScopeStorage>,
    code_storage: Arc<dyn AuthorizationCodeStorage>,
    consent: ConsentManager,
    audit: Arc<dyn AuditSink>,
    config: AuthorizationConfig,
}

impl AuthorizationService {
    #[must_use]
    pub fn new(
        client_storage: Arc<dyn ClientStorage>,
        scope_storage: Arc<dyn ScopeStorage>,
        code_storage: Arc<dyn AuthorizationCodeStorage>,
        consent: ConsentManager,
        audit: Arc<dyn AuditSink>,
        config: AuthorizationConfig,
    ) -> Self {
        Self {
            client_storage,
            scope_storage,
            code_storage,
            consent,
            audit,
            config,
        }
    }

    /// Runs the authorization flow for one request.
    ///
    /// Exactly one audit event is emitted per call.
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
        ctx: &RequestContext,
    ) -> AuthorizeOutcome {
        let outcome = self.evaluate(request, ctx).await;
        self.emit(default_action(&outcome), request, ctx, &outcome)
            .await;
        outcome
    }

    /// Records the user's approval of the requested scopes, then resumes
    /// the flow.
    ///
    /// The recorded set replaces whatever the user approved before. One
    /// `ConsentGranted` event covers the whole call; `code_issued` tells
    /// whether the resumed flow ended in a code.
    pub async fn approve(
        &self,
        request: &AuthorizationRequest,
        ctx: &RequestContext,
    ) -> AuthorizeOutcome {
        let outcome = self.approve_inner(request, ctx).await;
        let action = match &outcome {
            AuthorizeOutcome::NeedsLogin(_) => AuditAction::LoginRequired,
            _ => AuditAction::ConsentGranted,
        };
        let event = self
            .event(action, request, ctx, &outcome)
            .meta("code_issued", outcome.is_code());
        self.audit.emit(event.build()).await;
        outcome
    }

    async fn approve_inner(
        &self,
        request: &AuthorizationRequest,
        ctx: &RequestContext,
    ) -> AuthorizeOutcome {
        let validated = match self.validate(request).await {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };

        let Some(user_id) = ctx.user_id() else {
            return AuthorizeOutcome::NeedsLogin(validated.pending());
        };

        if let Err(e) = self
            .consent
            .record_consent(user_id, &validated.client.client_id, &validated.scopes)
            .await
        {
            tracing::error!(error = %e, "Failed to record consent");
            return redirect_error(&validated.redirect_uri, e, validated.state);
        }

        self.evaluate(request, ctx).await
    }

    /// Handles the user declining consent.
    ///
    /// Once client and redirect URI validate, the result is a redirect with
    /// `error=access_denied`.
    pub async fn deny(
        &self,
        request: &AuthorizationRequest,
        ctx: &RequestContext,
    ) -> AuthorizeOutcome {
        let outcome = match self.validate_target(request).await {
            Ok((_client, redirect_uri)) => redirect_error(
                &redirect_uri,
                AuthError::access_denied("The user denied the request"),
                request.state.clone(),
            ),
            Err(outcome) => outcome,
        };
        self.emit(AuditAction::ConsentDenied, request, ctx, &outcome)
            .await;
        outcome
    }

    async fn evaluate(
        &self,
        request: &AuthorizationRequest,
        ctx: &RequestContext,
    ) -> AuthorizeOutcome {
        let validated = match self.validate(request).await {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };

        // 6. End-user session
        let Some(user_id) = ctx.user_id() else {
            return AuthorizeOutcome::NeedsLogin(validated.pending());
        };

        // 7. Consent
        match self
            .consent
            .has_sufficient_consent(user_id, &validated.client.client_id, &validated.scopes)
            .await
        {
            Ok(true) => {}
            Ok(false) => return AuthorizeOutcome::NeedsConsent(validated.pending()),
            Err(e) => {
                tracing::error!(error = %e, "Consent lookup failed");
                return redirect_error(&validated.redirect_uri, e, validated.state);
            }
        }

        // 8. Code issuance
        match self.issue_code(request, &validated, user_id).await {
            Ok(code) => {
                let response = AuthorizationResponse::new(code, validated.state.clone());
                match response.to_redirect_url(&validated.redirect_uri) {
                    Ok(location) => AuthorizeOutcome::Code {
                        location,
                        client_id: validated.client.client_id,
                        scope: join_scope(&validated.scopes),
                    },
                    Err(e) => AuthorizeOutcome::Fatal(AuthError::internal(format!(
                        "redirect_uri became unparseable: {e}"
                    ))),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to store authorization code");
                redirect_error(&validated.redirect_uri, e, validated.state)
            }
        }
    }

    /// Steps 1 to 3. Every failure here is answered directly.
    async fn validate_target(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<(Client, String), AuthorizeOutcome> {
        // 1. Structure
        let client_id = required_exact(&request.client_id, "client_id")?;
        let redirect_uri = required_exact(&request.redirect_uri, "redirect_uri")?;
        let response_type = required(&request.response_type, "response_type")?;
        let scope = required(&request.scope, "scope")?;

        if response_type != "code" {
            return Err(AuthorizeOutcome::Fatal(AuthError::unsupported_response_type(
                response_type,
            )));
        }
        if url::Url::parse(redirect_uri).is_err() {
            return Err(AuthorizeOutcome::Fatal(AuthError::invalid_request(
                "redirect_uri must be an absolute URI",
            )));
        }
        if !scope.split_whitespace().all(is_valid_scope_token) {
            return Err(AuthorizeOutcome::Fatal(AuthError::invalid_request(
                "scope is malformed",
            )));
        }

        // 2. Client
        let client = match self.client_storage.find_by_client_id(client_id).await {
            Ok(Some(client)) if client.active => client,
            Ok(Some(_)) => {
                return Err(AuthorizeOutcome::Fatal(AuthError::invalid_client(
                    "Client is inactive",
                )));
            }
            Ok(None) => {
                return Err(AuthorizeOutcome::Fatal(AuthError::invalid_client(
                    "Unknown client",
                )));
            }
            Err(e) => {
                tracing::error!(error = %e, "Client lookup failed");
                return Err(AuthorizeOutcome::Fatal(e));
            }
        };

        // 3. Redirect URI
        if !client.is_redirect_uri_allowed(redirect_uri) {
            tracing::warn!(
                client_id = %client.client_id,
                "Authorization request with unregistered redirect_uri"
            );
            return Err(AuthorizeOutcome::Fatal(AuthError::invalid_request(
                "redirect_uri is not registered for this client",
            )));
        }

        Ok((client, redirect_uri.to_string()))
    }

    /// Steps 1 to 5.
    async fn validate(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<ValidatedRequest, AuthorizeOutcome> {
        let (client, redirect_uri) = self.validate_target(request).await?;
        let state = request.state.clone();
        let fail = |error: AuthError| redirect_error(&redirect_uri, error, state.clone());

        if !client.is_grant_type_allowed(GrantType::AuthorizationCode) {
            return Err(fail(AuthError::unauthorized_client(
                "Client is not authorized for the authorization_code grant",
            )));
        }

        // 4. PKCE
        validate_pkce(request, &client).map_err(&fail)?;

        // 5. Scopes
        let scopes = parse_scope(request.scope.as_deref().unwrap_or_default());
        if let Err(e) = self.validate_scopes(&scopes, &client).await {
            if e.is_server_error() {
                tracing::error!(error = %e, "Scope lookup failed");
            }
            return Err(fail(e));
        }

        Ok(ValidatedRequest {
            client,
            redirect_uri,
            scopes,
            state,
        })
    }

    async fn validate_scopes(&self, scopes: &[String], client: &Client) -> AuthResult<()> {
        if scopes.is_empty() {
            return Err(AuthError::invalid_scope("At least one scope is required"));
        }
        if let Some(denied) = scopes.iter().find(|s| !client.is_scope_allowed(s)) {
            return Err(AuthError::invalid_scope(format!(
                "Scope '{denied}' is not allowed for this client"
            )));
        }

        let known = self.scope_storage.find_scopes(scopes).await?;
        for scope in scopes {
            if !known.iter().any(|d| d.active && &d.name == scope) {
                return Err(AuthError::invalid_scope(format!("Unknown scope '{scope}'")));
            }
        }
        Ok(())
    }

    async fn issue_code(
        &self,
        request: &AuthorizationRequest,
        validated: &ValidatedRequest,
        user_id: &str,
    ) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        let code = AuthorizationCode {
            code: generate_opaque_token(),
            client_id: validated.client.client_id.clone(),
            user_id: user_id.to_string(),
            redirect_uri: validated.redirect_uri.clone(),
            scope: join_scope(&validated.scopes),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request
                .code_challenge
                .as_ref()
                .map(|_| PkceChallengeMethod::S256.as_str().to_string()),
            nonce: request.nonce.clone(),
            created_at: now,
            expires_at: now + validated.client.code_lifetime(self.config.code_lifetime),
            used: false,
        };
        self.code_storage.create(&code).await?;

        tracing::debug!(
            client_id = %code.client_id,
            user_id = %code.user_id,
            "Issued authorization code"
        );
        Ok(code.code)
    }

    async fn emit(
        &self,
        action: AuditAction,
        request: &AuthorizationRequest,
        ctx: &RequestContext,
        outcome: &AuthorizeOutcome,
    ) {
        let event = self.event(action, request, ctx, outcome);
        self.audit.emit(event.build()).await;
    }

    fn event(
        &self,
        action: AuditAction,
        request: &AuthorizationRequest,
        ctx: &RequestContext,
        outcome: &AuthorizeOutcome,
    ) -> AuditEventBuilder {
        let client_id = request.client_id.as_deref().unwrap_or_default();
        let mut event = AuditEvent::builder(action).resource(format!("client:{client_id}"));
        event = match ctx.user_id() {
            Some(user_id) => event.user(user_id),
            None => event.client(client_id),
        };
        if let Some(request_id) = &ctx.request_id {
            event = event.meta("request_id", request_id.as_str());
        }
        event = match outcome {
            AuthorizeOutcome::Code { scope, .. } => event.meta("scope", scope.as_str()),
            AuthorizeOutcome::NeedsLogin(pending) | AuthorizeOutcome::NeedsConsent(pending) => {
                event.meta("scope", pending.scope())
            }
            AuthorizeOutcome::Error { error, .. } => event
                .failure(error)
                .meta("redirected", true),
            AuthorizeOutcome::Fatal(error) => event.failure(error).meta("redirected", false),
        };
        event
    }

    #[must_use]
    pub fn config(&self) -> &AuthorizationConfig {
        &self.config
    }
}

fn default_action(outcome: &AuthorizeOutcome) -> AuditAction {
    match outcome {
        AuthorizeOutcome::Code { .. } => AuditAction::AuthorizationCodeIssued,
        AuthorizeOutcome::NeedsLogin(_) => AuditAction::LoginRequired,
        AuthorizeOutcome::NeedsConsent(_) => AuditAction::ConsentRequired,
        AuthorizeOutcome::Error { .. } | AuthorizeOutcome::Fatal(_) => {
            AuditAction::AuthorizationFailed
        }
    }
}

/// A present, non-blank parameter, returned as sent.
fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AuthorizeOutcome> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AuthorizeOutcome::Fatal(AuthError::invalid_request(format!(
            "Missing required parameter: {name}"
        )))),
    }
}

/// Like [`required`], for identifiers compared byte for byte against
/// registered values. Surrounding whitespace is rejected, not stripped.
fn required_exact<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AuthorizeOutcome> {
    let v = required(value, name)?;
    if v.trim() != v {
        return Err(AuthorizeOutcome::Fatal(AuthError::invalid_request(format!(
            "{name} must not contain surrounding whitespace"
        ))));
    }
    Ok(v)
}

fn validate_pkce(request: &AuthorizationRequest, client: &Client) -> AuthResult<()> {
    let challenge = request.code_challenge.as_deref();
    let method = request.code_challenge_method.as_deref();

    if client.requires_pkce() && (challenge.is_none() || method.is_none()) {
        return Err(AuthError::invalid_request(
            "code_challenge and code_challenge_method are required for this client",
        ));
    }

    match (challenge, method) {
        (None, None) => Ok(()),
        (Some(challenge), Some(method)) => {
            PkceChallengeMethod::parse(method)?;
            PkceChallenge::new(challenge.to_string())?;
            Ok(())
        }
        _ => Err(AuthError::invalid_request(
            "code_challenge and code_challenge_method must be provided together",
        )),
    }
}

fn redirect_error(
    redirect_uri: &str,
    error: AuthError,
    state: Option<String>,
) -> AuthorizeOutcome {
    match AuthorizationErrorResponse::from_error(&error, state).to_redirect_url(redirect_uri) {
        Ok(location) => AuthorizeOutcome::Error { location, error },
        Err(_) => AuthorizeOutcome::Fatal(error),
    }
}
