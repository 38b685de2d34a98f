//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("service {service}: {reason}")]
    InvalidService { service: String, reason: String },
}

impl ConfigError {
    /// Shorthand for a per-service validation failure.
    pub fn invalid(service: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidService {
            service: service.to_string(),
            reason: reason.into(),
        }
    }
}
