//! Tracing setup for the `timebox` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary (or to whatever harness embeds the crate).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for diagnostics.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset, which still
/// reports timeouts and detached threads.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=timebox=debug timebox run --timeout-ms 500 -- ./slow-test
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
