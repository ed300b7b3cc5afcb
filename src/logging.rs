//! Diagnostic tracing, separate from operator-facing output.
//!
//! Handlers talk to the operator through the [`Toolbox`](crate::toolbox::Toolbox);
//! `tracing` events are for debugging the engine and go to stderr. The filter
//! comes from `RUST_LOG`, falling back to the configured `log_filter`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// # Example
/// ```bash
/// RUST_LOG=runbook=debug runbook exec deploy.yml
/// ```
pub fn init(fallback_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // A subscriber may already be installed (e.g. by an embedding program).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
