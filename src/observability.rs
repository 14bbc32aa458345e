//! Structured logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::StoreResult;

/// Initialize JSON-formatted tracing at the configured log level.
///
/// An unparsable level falls back to `info`.
pub fn init_tracing(config: &Config) -> StoreResult<()> {
    let log_level = config.service.log_level.clone();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Tracing initialized for service: {}", config.service.name);

    Ok(())
}
