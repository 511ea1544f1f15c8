//! Consent decision handler.
//!
//! The hosting consent UI posts the original authorize parameters back with
//! the user's decision:
//!
//! ```text
//! POST /consent
//! Content-Type: application/x-www-form-urlencoded
//!
//! client_id=app&redirect_uri=...&response_type=code&scope=openid&state=xyz&decision=approve
//! ```
//!
//! `approve` records the scopes (replacing any earlier grant) and resumes the
//! authorize flow. `deny` redirects with `error=access_denied`.

use axum::Form;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::audit::AuditAction;
use crate::error::AuthError;
use crate::oauth::authorize::AuthorizationRequest;

use super::authorize::outcome_response;
use super::AuthState;

/// The user's answer on the consent screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDecision {
    Approve,
    Deny,
}

/// Form body for `POST /consent`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentForm {
    #[serde(flatten)]
    pub request: AuthorizationRequest,

    pub decision: Option<ConsentDecision>,
}

/// `POST /consent`.
pub async fn consent_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    form: Result<Form<ConsentForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected consent form");
            let error = AuthError::invalid_request(
                "Expected a form-encoded body with decision=approve|deny",
            );
            return state
                .reject_malformed(
                    AuditAction::AuthorizationFailed,
                    "endpoint:consent",
                    &headers,
                    error,
                )
                .await;
        }
    };
    let Some(decision) = form.decision else {
        let error = AuthError::invalid_request("Missing decision parameter");
        return state
            .reject_malformed(
                AuditAction::AuthorizationFailed,
                "endpoint:consent",
                &headers,
                error,
            )
            .await;
    };

    let ctx = state.request_context(&headers);
    let service = &state.authorization_service;
    let outcome = match decision {
        ConsentDecision::Approve => service.approve(&form.request, &ctx).await,
        ConsentDecision::Deny => service.deny(&form.request, &ctx).await,
    };
    outcome_response(&state, &form.request, outcome)
}
