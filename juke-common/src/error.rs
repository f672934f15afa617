//! Common error types for Juke services

use thiserror::Error;

/// Common result type for Juke operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared across Juke services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
