//! Token issuance, introspection and revocation.
//!
//! - Authorization code, refresh token and client credentials grants
//! - Token introspection (RFC 7662)
//! - Token revocation (RFC 7009)

pub mod introspection;
pub mod revocation;
pub mod service;

pub use introspection::{IntrospectionRequest, IntrospectionResponse};
pub use revocation::{RevocationRequest, TokenTypeHint};
pub use service::{CleanupReport, TokenConfig, TokenService};
