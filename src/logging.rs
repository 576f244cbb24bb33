//! Diagnostic tracing for the command-line binary.
//!
//! Library code emits `tracing` events under the `tfharness::engine` target
//! and never installs a subscriber itself. The binary calls [`init`] once at
//! start-up.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to [`DEFAULT_FILTER`]. Output goes to stderr
/// in the compact format so stdout stays reserved for command results.
///
/// # Example
/// ```bash
/// RUST_LOG=tfharness::engine=debug tfharness --dir ./network validate
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
