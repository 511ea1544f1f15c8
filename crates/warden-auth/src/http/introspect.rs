//! Token introspection endpoint handler (RFC 7662).
//!
//! ```text
//! POST /introspect
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_credentials>
//!
//! token=<token>&token_type_hint=access_token
//! ```
//!
//! Unknown, expired and revoked tokens are reported as `{"active": false}`.

use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};

use crate::audit::AuditAction;
use crate::error::AuthError;
use crate::token::introspection::IntrospectionRequest;

use super::{AuthState, NO_STORE, client_credentials, error_response};

/// `POST /introspect`.
///
/// # Response
///
/// - 200 OK: introspection result (active or not)
/// - 400 Bad Request: missing `token` or malformed body
/// - 401 Unauthorized: invalid client credentials
pub async fn introspect_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    form: Result<Form<IntrospectionRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected introspection body");
            let error = AuthError::invalid_request(
                "Introspection requests must be application/x-www-form-urlencoded",
            );
            return state
                .reject_malformed(
                    AuditAction::TokenIntrospected,
                    "endpoint:introspect",
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
    match state
        .token_service
        .introspect(&request, &credentials)
        .await
    {
        Ok(response) => (StatusCode::OK, NO_STORE, Json(response)).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Introspection rejected");
            error_response(&e)
        }
    }
}
