//! Structured logging initialisation.
//!
//! Console tracing with an environment-driven filter (`RUST_LOG`), guarded so
//! repeated initialisation (tests, embedded use) is a no-op.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
