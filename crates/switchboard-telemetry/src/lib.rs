//! Logging setup for Switchboard
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a
//! `fmt` layer in either text or JSON format.

use switchboard_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging from configuration
///
/// `RUST_LOG`, when set, takes precedence over the configured filter.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber is already installed
pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    let filter = build_filter(config)?;

    let fmt_layer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn build_filter(config: &TelemetryConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(directive) = std::env::var(EnvFilter::DEFAULT_ENV)
        && !directive.trim().is_empty()
    {
        return EnvFilter::try_new(&directive)
            .map_err(|e| anyhow::anyhow!("invalid {} directive '{directive}': {e}", EnvFilter::DEFAULT_ENV));
    }

    EnvFilter::try_new(&config.filter)
        .map_err(|e| anyhow::anyhow!("invalid telemetry filter '{}': {e}", config.filter))
}
