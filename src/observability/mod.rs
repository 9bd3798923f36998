//! Tracing subscriber setup for host applications

use anyhow::{Context, Result};
use tracing::{debug, Subscriber};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is not set
pub fn default_directive(level: &str) -> String {
    format!("landmark_explorer={}", level.trim().to_lowercase())
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(default_directive(level))
        .with_context(|| format!("Invalid log level '{}'", level))
}

/// Layered subscriber for `config` without installing it. `RUST_LOG` wins over
/// the configured level when set.
pub fn build_subscriber(config: &LoggingConfig) -> Result<impl Subscriber + Send + Sync + 'static> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.level)?,
    };

    let json = config.json;
    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer())))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    build_subscriber(config)?
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    debug!("Logging initialised (level {}, json {})", config.level, config.json);
    Ok(())
}
