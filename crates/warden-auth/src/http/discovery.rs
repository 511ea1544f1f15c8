//! Discovery handlers.
//!
//! - `GET /.well-known/openid-configuration`
//! - `GET /.well-known/jwks.json`

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::oauth::client_auth::TokenEndpointAuthMethod;

use super::{AuthState, error_response};

/// Handler for `GET /.well-known/openid-configuration`.
///
/// Endpoint URLs are derived from the configured issuer, not the bind
/// address. `scopes_supported` lists the currently active scopes.
pub async fn openid_configuration_handler(State(state): State<AuthState>) -> Response {
    let scopes = match state.scope_storage.list_active().await {
        Ok(scopes) => scopes.into_iter().map(|s| s.name).collect::<Vec<_>>(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list scopes for discovery");
            return error_response(&e);
        }
    };

    let base = state.base_url();
    let auth_methods: Vec<&str> = TokenEndpointAuthMethod::ALL
        .iter()
        .map(|m| m.as_str())
        .collect();

    let doc = json!({
        "issuer": state.config.issuer,
        "authorization_endpoint": format!("{base}/authorize"),
        "token_endpoint": format!("{base}/token"),
        "introspection_endpoint": format!("{base}/introspect"),
        "revocation_endpoint": format!("{base}/revoke"),
        "jwks_uri": format!("{base}/.well-known/jwks.json"),
        "response_types_supported": ["code"],
        "grant_types_supported": state.config.oauth.grant_types,
        "scopes_supported": scopes,
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": auth_methods,
        "id_token_signing_alg_values_supported": [state.token_service.jwt_service().algorithm().as_str()],
    });

    ([(header::CONTENT_TYPE, "application/json")], Json(doc)).into_response()
}

/// Handler for `GET /.well-known/jwks.json`.
///
/// The RSA public key when RS256 is configured; an empty set for HS256.
pub async fn jwks_handler(State(state): State<AuthState>) -> impl IntoResponse {
    let jwks = state.token_service.jwt_service().jwks();
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    )
}
