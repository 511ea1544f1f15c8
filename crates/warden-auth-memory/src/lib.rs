//! In-memory storage backend for the Warden authorization server.
//!
//! [`InMemoryAuthStore`] implements every storage trait from
//! `warden-auth::storage`, so a single `Arc` can back all services.
//!
//! # Example
//!
//! ```ignore
//! use warden_auth_memory::InMemoryAuthStore;
//!
//! let store = create_auth_store();
//! let tokens = TokenService::new(jwt, store.clone(), store.clone(), store.clone(), rbac, audit, config);
//! ```

pub mod store;

pub use store::InMemoryAuthStore;

/// Creates a new, empty shared store.
pub fn create_auth_store() -> std::sync::Arc<InMemoryAuthStore> {
    std::sync::Arc::new(InMemoryAuthStore::new())
}
