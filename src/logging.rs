//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. [`init_logging`] installs a `tracing-subscriber` fmt layer
//! writing to stderr, in text or JSON, filtered by `RUST_LOG` when set and
//! by `[logging] level` otherwise.

use crate::config::{LogFormat, LoggingConfig};
use thiserror::Error;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter `{directive}`: {reason}")]
    Filter { directive: String, reason: String },
    #[error("Logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the event filter: `RUST_LOG` wins over the configured level.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| LoggingError::Filter {
        directive: config.level.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber. `verbose` forces `debug` regardless of
/// config and environment.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<(), LoggingError> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        build_env_filter(config)?
    };
    let base = Registry::default().with(filter);

    match config.format {
        LogFormat::Json => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Text => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    Ok(())
}
