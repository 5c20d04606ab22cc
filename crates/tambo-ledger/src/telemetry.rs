//! Tracing subscriber setup for the binaries that host the ledger.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - `RUST_LOG=tambo_ledger=trace` - Trace the ledger only
//! - Default: `info,tambo=debug,sqlx=warn`

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,tambo=debug,sqlx=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global fmt subscriber.
///
/// Panics if a global subscriber is already set; call it once from `main`.
pub fn init_tracing() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Like [`init_tracing`], but a no-op when a subscriber already exists.
/// Tests call this freely.
pub fn try_init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}
