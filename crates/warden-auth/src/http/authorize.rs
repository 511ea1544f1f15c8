//! Authorization endpoint handler.
//!
//! ```text
//! GET /authorize?client_id=...&redirect_uri=...
//!     ├─► Untrusted client/redirect_uri → JSON error, no redirect
//!     ├─► Error after redirect_uri validated → 302 redirect_uri?error=...&state=...
//!     ├─► No session → 302 to login_url, or 401 {"interaction":"login_required"}
//!     ├─► No consent → 302 to consent_url, or 403 {"interaction":"consent_required"}
//!     └─► Authenticated + consented → 302 redirect_uri?code=...&state=...
//! ```

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use url::Url;

use crate::audit::AuditAction;
use crate::error::AuthError;
use crate::oauth::authorize::AuthorizationRequest;
use crate::oauth::service::{AuthorizeOutcome, PendingAuthorization};

use super::{AuthState, error_response, found};

/// `GET /authorize`.
pub async fn authorize_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    query: Result<Query<AuthorizationRequest>, QueryRejection>,
) -> Response {
    let Query(request) = match query {
        Ok(query) => query,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Malformed authorize query");
            return state
                .reject_malformed(
                    AuditAction::AuthorizationFailed,
                    "endpoint:authorize",
                    &headers,
                    AuthError::invalid_request("Malformed query string"),
                )
                .await;
        }
    };

    let ctx = state.request_context(&headers);
    let outcome = state
        .authorization_service
        .authorize(&request, &ctx)
        .await;
    outcome_response(&state, &request, outcome)
}

/// Turns an authorization outcome into the HTTP response the user agent sees.
pub(crate) fn outcome_response(
    state: &AuthState,
    request: &AuthorizationRequest,
    outcome: AuthorizeOutcome,
) -> Response {
    match outcome {
        AuthorizeOutcome::Code { location, .. } | AuthorizeOutcome::Error { location, .. } => {
            found(&location)
        }
        AuthorizeOutcome::Fatal(error) => error_response(&error),
        AuthorizeOutcome::NeedsLogin(pending) => login_required(state, request, &pending),
        AuthorizeOutcome::NeedsConsent(pending) => consent_required(state, request, &pending),
    }
}

fn login_required(
    state: &AuthState,
    request: &AuthorizationRequest,
    pending: &PendingAuthorization,
) -> Response {
    if let Some(login_url) = &state.config.interaction.login_url {
        let return_to = format!(
            "{}/authorize?{}",
            state.base_url(),
            request.to_query_string()
        );
        return match Url::parse(login_url) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("return_to", &return_to);
                found(url.as_str())
            }
            Err(e) => {
                tracing::error!(error = %e, "Configured login_url is not a valid URL");
                error_response(&AuthError::configuration("invalid login_url"))
            }
        };
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "interaction": "login_required",
            "client_id": pending.client_id,
            "scope": pending.scope(),
        })),
    )
        .into_response()
}

fn consent_required(
    state: &AuthState,
    request: &AuthorizationRequest,
    pending: &PendingAuthorization,
) -> Response {
    if let Some(consent_url) = &state.config.interaction.consent_url {
        return match Url::parse(consent_url) {
            Ok(mut url) => {
                let query = request.to_query_string();
                url.query_pairs_mut()
                    .extend_pairs(url::form_urlencoded::parse(query.as_bytes()));
                found(url.as_str())
            }
            Err(e) => {
                tracing::error!(error = %e, "Configured consent_url is not a valid URL");
                error_response(&AuthError::configuration("invalid consent_url"))
            }
        };
    }

    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "interaction": "consent_required",
            "client_id": pending.client_id,
            "client_name": pending.client_name,
            "scope": pending.scope(),
        })),
    )
        .into_response()
}
