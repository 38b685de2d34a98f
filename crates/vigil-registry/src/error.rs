//! Registry client error types.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur talking to the coordination service.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The coordination service is unreachable or the session is lost.
    ///
    /// Transient: callers retry at their next natural schedule point.
    #[error("not connected to the registry")]
    NotConnected,

    #[error("invalid registry address: {0}")]
    InvalidAddress(String),

    #[error("invalid registration path: {0}")]
    InvalidPath(String),

    #[error("registry rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("registry transport error: {0}")]
    Transport(String),
}
