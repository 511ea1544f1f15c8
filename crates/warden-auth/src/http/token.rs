//! Token endpoint handler.
//!
//! Supports the following grant types:
//!
//! - `authorization_code` - Exchange authorization code for tokens
//! - `refresh_token` - Refresh an access token
//! - `client_credentials` - Machine-to-machine authentication
//!
//! # Example
//!
//! ```ignore
//! // Authorization code grant
//! POST /token
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=authorization_code
//! &code=SplxlOBeZQQYbYS6WxSbIA
//! &redirect_uri=https://app.example.com/callback
//! &code_verifier=dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk
//! &client_id=my-app
//!
//! // Client credentials grant
//! POST /token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <base64(client_id:client_secret)>
//!
//! grant_type=client_credentials
//! &scope=reports
//! ```

use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use tracing::debug;

use crate::audit::AuditAction;
use crate::error::AuthError;
use crate::oauth::token::TokenRequest;

use super::{AuthState, NO_STORE, client_credentials, error_response};

/// `POST /token`.
///
/// Only `application/x-www-form-urlencoded` bodies are accepted; anything
/// else is `invalid_request` with status 400.
///
/// # Client Authentication
///
/// - HTTP Basic: `Authorization: Basic <base64(client_id:client_secret)>`
/// - Request body: `client_id` and `client_secret`
/// - Public client: `client_id` only
pub async fn token_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected token request body");
            let error = AuthError::invalid_request(
                "Token requests must be application/x-www-form-urlencoded",
            );
            return state
                .reject_malformed(
                    AuditAction::TokenRequestFailed,
                    "endpoint:token",
                    &headers,
                    error,
                )
                .await;
        }
    };

    debug!(
        grant_type = ?request.grant_type,
        client_id = ?request.client_id,
        "Processing token request"
    );

    let credentials = client_credentials(
        &headers,
        request.client_id.clone(),
        request.client_secret.clone(),
    );
    match state.token_service.token(&request, &credentials).await {
        Ok(response) => (StatusCode::OK, NO_STORE, Json(response)).into_response(),
        Err(e) => error_response(&e),
    }
}
