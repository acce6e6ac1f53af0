//! Structured logging setup.
//!
//! Installs a `tracing` subscriber with:
//! - `RUST_LOG` environment filter support (default `scriptvox=info`)
//! - JSON output when `RUST_LOG_FORMAT=json`
//! - Human-readable output on stderr otherwise

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Safe to call multiple times; only the first call installs anything.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scriptvox=info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if json_requested() {
        subscriber.json().try_init().is_ok()
    } else {
        subscriber.try_init().is_ok()
    };
    if installed {
        tracing::debug!("Logging initialized");
    }
}

fn json_requested() -> bool {
    std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
