//! Logging setup for repo-guard
//!
//! Installs a `tracing` subscriber that writes structured JSON lines (or a
//! human readable format for local runs) at the configured level.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Logging setup errors
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

/// Map a configured level name to a tracing level
///
/// Unknown names fall back to `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the global tracing subscriber
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = tracing_subscriber::filter::LevelFilter::from_level(parse_level(&config.level));

    if config.format.eq_ignore_ascii_case("pretty") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))
    }
}
