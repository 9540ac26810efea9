//! Tracing setup
//!
//! The engine only emits `tracing` events; installing a subscriber is left to
//! the application. [`init_tracing`] is a convenience for services that have
//! no subscriber of their own.

use tracing_subscriber::EnvFilter;

use crate::{
    config::QueryConfig,
    error::{Error, Result},
};

/// Install a JSON subscriber filtered by `config.log_level`
///
/// An unparseable level falls back to `info`.
///
/// # Errors
///
/// Returns [`Error::Observability`] if a global subscriber is already set.
pub fn init_tracing(config: &QueryConfig) -> Result<()> {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Observability(e.to_string()))?;

    tracing::info!(
        default_page_size = config.default_page_size,
        max_page_size = config.max_page_size,
        "Tracing initialized for query engine"
    );

    Ok(())
}

