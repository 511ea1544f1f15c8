//! # warden-auth
//!
//! OAuth 2.1 authorization server core.
//!
//! This crate provides:
//! - Authorization code flow with mandatory S256 PKCE for public clients
//! - Token endpoint: `authorization_code`, `refresh_token` (with rotation)
//!   and `client_credentials` grants
//! - Token introspection (RFC 7662) and revocation (RFC 7009)
//! - Role-based permissions embedded in access tokens
//! - Per-client user consent
//! - Audit events for every terminal outcome
//!
//! ## Modules
//!
//! - [`config`] - Authorization server configuration
//! - [`types`] - Clients, scopes, codes, tokens, roles, consent
//! - [`storage`] - Storage traits implemented by persistence adapters
//! - [`crypto`] - PKCE, secret hashing and JWT signing
//! - [`oauth`] - Authorization engine and client authentication
//! - [`token`] - Token engine
//! - [`rbac`] - Effective permission resolution
//! - [`consent`] - Consent manager
//! - [`audit`] - Security event audit logging
//! - [`http`] - Axum HTTP handlers for the endpoints

pub mod audit;
pub mod config;
pub mod consent;
pub mod crypto;
pub mod error;
pub mod http;
pub mod oauth;
pub mod rbac;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAuditSink, NoopAuditSink, TracingAuditSink};
pub use config::{AuthConfig, ConfigError};
pub use consent::ConsentManager;
pub use crypto::{JwtService, SigningKeyPair};
pub use error::{AuthError, ErrorCategory};
pub use http::{AuthState, router};
pub use oauth::{
    AuthorizationConfig, AuthorizationRequest, AuthorizationService, AuthorizeOutcome,
    ClientCredentials, HeaderSessionResolver, NoSessionResolver, RequestContext, SessionResolver,
    UserSession,
};
pub use rbac::{EffectivePermissions, RbacError, RbacResolver};
pub use storage::{
    AuthorizationCodeStorage, ClientStorage, ConsentStorage, RbacStorage, ScopeStorage,
    TokenStorage,
};
pub use token::{CleanupReport, TokenConfig, TokenService};
pub use types::{Client, ClientType, GrantType};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;
