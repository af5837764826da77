//! Telemetry
//!
//! Structured logging setup for the controller binary and tests.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const DEFAULT_FILTER: &str = "linguistic_automation=info";

/// Install the global `tracing` subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()
}

/// Best-effort subscriber for tests; repeated calls are ignored
pub fn init_test_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("linguistic_automation=debug"))
        .with_test_writer()
        .try_init();
}
