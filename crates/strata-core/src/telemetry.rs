//! Tracing subscriber setup for embedding hosts.
//!
//! The runtime itself only emits `tracing` events; hosts that do not
//! install their own subscriber can call [`init_telemetry`].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install a global subscriber filtered by `log_level`.
///
/// Fails if the filter does not parse or a subscriber is already set.
pub fn init_telemetry(log_level: &str, json_format: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)?;

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

pub fn init_from_config(config: &LoggingConfig) -> anyhow::Result<()> {
    init_telemetry(&config.level, config.json)
}
