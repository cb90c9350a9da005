//! Logging setup for the provider process.
//!
//! Logs go to **stderr**; stdout belongs to the engine that spawned the
//! provider. Filtering follows `RUST_LOG`.
//!
//! ```bash
//! # Lifecycle decisions (create/update/delete, drift removals)
//! RUST_LOG=info ./provider
//!
//! # Every remote call and classification
//! RUST_LOG=hemmer_provider_cloudnet=debug ./provider
//! ```

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// The level used when `RUST_LOG` is not set.
pub const DEFAULT_LEVEL: &str = "info";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn registry(default_level: &str) -> impl SubscriberInitExt {
    tracing_subscriber::registry().with(filter(default_level)).with(
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the global subscriber at [`DEFAULT_LEVEL`].
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Install the global subscriber, using `default_level` when `RUST_LOG` is
/// not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    registry(default_level).init();
}

/// Install the global subscriber unless one is already set.
///
/// Returns `false` if a subscriber was already installed.
pub fn try_init_logging() -> bool {
    registry(DEFAULT_LEVEL).try_init().is_ok()
}
