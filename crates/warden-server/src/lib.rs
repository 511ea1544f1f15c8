//! # warden-server
//!
//! Hosts the Warden authorization server: configuration loading, tracing,
//! store bootstrap and the HTTP listener.

pub mod bootstrap;
pub mod config;
pub mod middleware;
pub mod observability;
pub mod server;

pub use bootstrap::{AuthComponents, BootstrapError, build_auth, seed_store};
pub use config::{AppConfig, BootstrapClient, BootstrapConfig, LoggingConfig, ServerConfig};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{ServerBuilder, WardenServer, build_app, spawn_cleanup_task};
