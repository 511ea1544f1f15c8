//! End-user session and request context.
//!
//! The engines never read ambient state. The hosting layer resolves who the
//! end user is (if anyone) and passes an immutable [`RequestContext`] into
//! each call.

use axum::http::HeaderMap;
use time::OffsetDateTime;

/// An authenticated end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: String,
    pub authenticated_at: OffsetDateTime,
}

impl UserSession {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            authenticated_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Per-request inputs the core needs besides the protocol parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// The authenticated end user, if any.
    pub user: Option<UserSession>,

    /// Correlation id for logs and audit metadata.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// A context with no authenticated user.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context for an authenticated user.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user: Some(UserSession::new(user_id)),
            request_id: None,
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user_id.as_str())
    }
}

/// Resolves the end-user session for an incoming request.
///
/// Login itself happens outside this crate; implementations only read the
/// result (a cookie, a header set by a trusted proxy, ...).
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<UserSession>;
}

/// Never finds a session. Every authorize request reports `needs_login`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSessionResolver;

impl SessionResolver for NoSessionResolver {
    fn resolve(&self, _headers: &HeaderMap) -> Option<UserSession> {
        None
    }
}

/// Reads the user id from a header set by a trusted upstream.
#[derive(Debug, Clone)]
pub struct HeaderSessionResolver {
    header: String,
}

impl HeaderSessionResolver {
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
        }
    }
}

impl SessionResolver for HeaderSessionResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<UserSession> {
        let value = headers.get(self.header.as_str())?.to_str().ok()?.trim();
        if value.is_empty() {
            return None;
        }
        Some(UserSession::new(value))
    }
}
