//! Process-wide tracing subscriber setup.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info";

/// `RUST_LOG` when it parses, otherwise `default_filter`.
pub fn resolve_env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Installs the fmt subscriber on stderr; a second call is a no-op.
pub fn init_tracing(default_filter: &str) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(resolve_env_filter(default_filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    if installed.is_err() {
        tracing::debug!(phase = "startup", event = "subscriber_already_installed");
    }
}
