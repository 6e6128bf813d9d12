//! Logging setup for the provider process.
//!
//! All output goes to **stderr**, since the orchestrator owns stdout of the
//! provider process. Filtering follows the `RUST_LOG` environment variable.
//!
//! # Quick Start
//!
//! ```ignore
//! use hemmer_provider_pagerduty::init_logging;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_logging();
//!     tracing::info!("Starting provider");
//! }
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Trace retries and link state transitions
//! RUST_LOG=hemmer_provider_pagerduty=debug ./provider
//!
//! # Only report drift and exhausted retries
//! RUST_LOG=warn ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Initialize the stderr subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    subscriber(DEFAULT_LEVEL).init();
}

/// Like [`init_logging`], with a different fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to initialize logging, returning false if a subscriber is already set.
///
/// Useful in tests, where several cases may race to install one.
pub fn try_init_logging() -> bool {
    subscriber(DEFAULT_LEVEL).try_init().is_ok()
}
