//! Token revocation endpoint handler (RFC 7009).
//!
//! # Request Format
//!
//! ```text
//! POST /revoke
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_credentials>
//!
//! token=<token_to_revoke>&token_type_hint=refresh_token
//! ```
//!
//! # Response
//!
//! Always 200 OK with an empty body once the client is authenticated, so
//! callers learn nothing about whether the token existed.

use axum::Form;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::audit::AuditAction;
use crate::error::AuthError;
use crate::token::revocation::RevocationRequest;

use super::{AuthState, client_credentials, error_response};

/// `POST /revoke`.
///
/// # Response
///
/// - 200 OK: token revoked, already revoked, unknown, or owned by another client
/// - 400 Bad Request: missing `token` parameter
/// - 401 Unauthorized: invalid client credentials
pub async fn revoke_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    form: Result<Form<RevocationRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected revocation body");
            let error = AuthError::invalid_request(
                "Revocation requests must be application/x-www-form-urlencoded",
            );
            return state
                .reject_malformed(
                    AuditAction::TokenRevoked,
                    "endpoint:revoke",
                    &headers,
                    error,
                )
                .await;
        }
    };

    let credentials = client_credentials(
        &headers,
        request.client_id.clone(),
        request.client_secret.clone(),
    );
    match state.token_service.revoke(&request, &credentials).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Revocation rejected");
            error_response(&e)
        }
    }
}
