//! Axum handlers for the authorization server endpoints.
//!
//! - [`authorize`] - `GET /authorize`
//! - [`consent`] - `POST /consent`, posted by the hosting consent UI
//! - [`token`] - `POST /token`
//! - [`introspect`] - `POST /introspect` (RFC 7662)
//! - [`revoke`] - `POST /revoke` (RFC 7009)
//! - [`discovery`] - `/.well-known/openid-configuration` and `/.well-known/jwks.json`

pub mod authorize;
pub mod consent;
pub mod discovery;
pub mod introspect;
pub mod revoke;
pub mod token;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth::client_auth::ClientCredentials;
use crate::oauth::session::{RequestContext, SessionResolver};
use crate::oauth::service::AuthorizationService;
use crate::oauth::token::TokenError;
use crate::storage::ScopeStorage;
use crate::token::service::TokenService;

pub use authorize::authorize_handler;
pub use consent::{ConsentDecision, ConsentForm, consent_handler};
pub use discovery::{jwks_handler, openid_configuration_handler};
pub use introspect::introspect_handler;
pub use revoke::revoke_handler;
pub use token::token_handler;

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// State shared by every handler.
#[derive(Clone)]
pub struct AuthState {
    pub authorization_service: Arc<AuthorizationService>,
    pub token_service: Arc<TokenService>,
    pub scope_storage: Arc<dyn ScopeStorage>,
    pub session_resolver: Arc<dyn SessionResolver>,
    /// Receives events for requests that never reach a service.
    pub audit: Arc<dyn AuditSink>,
    pub config: Arc<AuthConfig>,
}

impl AuthState {
    pub fn new(
        authorization_service: Arc<AuthorizationService>,
        token_service: Arc<TokenService>,
        scope_storage: Arc<dyn ScopeStorage>,
        session_resolver: Arc<dyn SessionResolver>,
        audit: Arc<dyn AuditSink>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            authorization_service,
            token_service,
            scope_storage,
            session_resolver,
            audit,
            config,
        }
    }

    /// Answers a request whose body or query could not be parsed.
    ///
    /// Emits one failed `action` event, then the OAuth error response.
    pub(crate) async fn reject_malformed(
        &self,
        action: AuditAction,
        endpoint: &str,
        headers: &HeaderMap,
        error: AuthError,
    ) -> Response {
        let mut event = AuditEvent::builder(action)
            .resource(endpoint)
            .failure(&error)
            .meta("reason", error.to_string());
        if let Some(id) = request_id(headers) {
            event = event.meta("request_id", id);
        }
        self.audit.emit(event.build()).await;
        error_response(&error)
    }

    /// Builds the per-request context: resolved end user plus request id.
    pub(crate) fn request_context(&self, headers: &HeaderMap) -> RequestContext {
        let ctx = RequestContext {
            user: self.session_resolver.resolve(headers),
            request_id: None,
        };
        match request_id(headers) {
            Some(id) => ctx.with_request_id(id),
            None => ctx,
        }
    }

    /// Base URL for endpoint links, without a trailing slash.
    pub(crate) fn base_url(&self) -> &str {
        self.config.issuer.trim_end_matches('/')
    }
}

/// All authorization server routes, ready to be merged into an app router.
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/authorize", get(authorize_handler))
        .route("/consent", post(consent_handler))
        .route("/token", post(token_handler))
        .route("/introspect", post(introspect_handler))
        .route("/revoke", post(revoke_handler))
        .route(
            "/.well-known/openid-configuration",
            get(openid_configuration_handler),
        )
        .route("/.well-known/jwks.json", get(jwks_handler))
        .with_state(state)
}

// =============================================================================
// Shared helpers
// =============================================================================

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Client credentials from the `Authorization` header and the form body.
pub(crate) fn client_credentials(
    headers: &HeaderMap,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> ClientCredentials {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    ClientCredentials::new(authorization, client_id, client_secret)
}

/// Headers every token-bearing response carries.
pub(crate) const NO_STORE: [(header::HeaderName, &str); 2] = [
    (header::CACHE_CONTROL, "no-store"),
    (header::PRAGMA, "no-cache"),
];

/// OAuth error body `{error, error_description}` with the matching status.
pub(crate) fn error_response(err: &AuthError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, NO_STORE, Json(TokenError::from(err))).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"warden\""),
        );
    }
    response
}

/// 302 to `location`.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!("Redirect location is not a valid header value");
            error_response(&AuthError::internal("invalid redirect location"))
        }
    }
}
