//! Storage traits for authorization server data.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations and scope metadata
//! - Authorization codes
//! - Access and refresh token records
//! - Roles, permissions and their assignments
//! - Consent grants
//!
//! # Implementations
//!
//! - `warden-auth-memory` - transactional in-memory backend

pub mod authorization_code;
pub mod client;
pub mod consent;
pub mod rbac;
pub mod scope;
pub mod token;

pub use authorization_code::AuthorizationCodeStorage;
pub use client::ClientStorage;
pub use consent::ConsentStorage;
pub use rbac::RbacStorage;
pub use scope::ScopeStorage;
pub use token::TokenStorage;
