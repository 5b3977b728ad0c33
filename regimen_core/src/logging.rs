//! Logging infrastructure for Regimen.
//!
//! Provides centralized tracing setup for the CLI and any future service
//! binary. Evaluation paths rely on these levels: configuration-type
//! fallbacks log at debug, transient engine failures at error.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with sensible defaults.
///
/// Warnings and errors only by default: the CLI prints its results on
/// stdout, so info-level chatter stays out of the way unless RUST_LOG
/// asks for it.
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging with a specific default level.
///
/// The RUST_LOG environment variable still takes precedence.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false))
        .init();
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
