//! Telemetry for Manifold
//!
//! Structured logging via the `tracing` ecosystem. The subscriber honors
//! `RUST_LOG` when set, falling back to the configured filter directive.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(log_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}
