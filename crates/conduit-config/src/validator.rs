//! Configuration validation

use crate::ServiceConfig;
use conduit_core::{Error, Result};
use conduit_store::BackendConfig;

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    validate_server(config)?;
    validate_store(config)?;
    validate_logging(config)?;

    Ok(())
}

fn validate_server(config: &ServiceConfig) -> Result<()> {
    if config.server.max_body_size == 0 {
        return Err(Error::Config("max_body_size must be > 0".to_string()));
    }

    if config.server.shutdown_timeout.is_zero() {
        return Err(Error::Config("shutdown_timeout must be > 0".to_string()));
    }

    if config.server.shutdown_timeout.as_secs() > 300 {
        tracing::warn!("shutdown_timeout is very high (>5 minutes)");
    }

    Ok(())
}

fn validate_store(config: &ServiceConfig) -> Result<()> {
    if let BackendConfig::File { path } = &config.store.backend {
        if path.as_os_str().is_empty() {
            return Err(Error::Config("store file path cannot be empty".to_string()));
        }
        if config.store.busy_timeout.is_zero() {
            return Err(Error::Config(
                "store busy_timeout must be greater than 0".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(config: &ServiceConfig) -> Result<()> {
    match config.logging.level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(Error::Config(format!(
            "Invalid log level: {other} (must be trace, debug, info, warn or error)"
        ))),
    }
}
