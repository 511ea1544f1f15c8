// Tracing setup with a filter that can be swapped once the config file is read.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};
use warden_auth::audit::AUDIT_TARGET;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Filter directives for a configured level.
///
/// Audit records are emitted at `info` on their own target and stay visible
/// when the general level is raised to `warn` or `error`. `off` silences
/// everything, audit included.
pub fn filter_directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    match level.as_str() {
        "off" => level,
        "warn" | "error" => format!("{level},{AUDIT_TARGET}=info"),
        _ => level,
    }
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    // RUST_LOG wins over the configured level.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(filter_directives(level)));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Apply the configured logging level. An explicit `RUST_LOG` is left alone.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Some(handle) = LOG_RELOAD_HANDLE.get()
        && let Err(e) = handle.modify(|f| *f = EnvFilter::new(filter_directives(level)))
    {
        tracing::warn!(error = %e, "failed to apply logging level");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_kept_at_quiet_levels() {
        assert_eq!(filter_directives("warn"), "warn,warden::audit=info");
        assert_eq!(filter_directives("ERROR"), "error,warden::audit=info");
    }

    #[test]
    fn test_verbose_and_off_levels_pass_through() {
        assert_eq!(filter_directives("debug"), "debug");
        assert_eq!(filter_directives("info"), "info");
        assert_eq!(filter_directives("off"), "off");
    }
}
