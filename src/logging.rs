//! `tracing` initialization helpers.

use std::sync::Once;

/// Initializes the global `tracing` subscriber from `RUST_LOG` (or
/// `steadystate=info` by default). Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("steadystate=info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

/// Test-only tracing init, writing to stderr without ANSI codes so
/// captured test output stays readable.
#[cfg(test)]
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}
