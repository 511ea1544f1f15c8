//! Domain types shared by the protocol engines and storage adapters.

pub mod authorization_code;
pub mod client;
pub mod consent;
pub mod rbac;
pub mod scope;
pub mod token;

pub use authorization_code::AuthorizationCode;
pub use client::{
    Client, ClientType, ClientUpdate, ClientValidationError, GrantType, TokenLifetimes,
};
pub use consent::ConsentGrant;
pub use rbac::{Permission, Role, RolePermission, UserPermission, UserRole};
pub use scope::{ScopeDefinition, is_valid_scope_token, join_scope, parse_scope};
pub use token::{TokenKind, TokenRecord};
