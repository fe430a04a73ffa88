//! Common error types for kvbackup.

use thiserror::Error;

/// Top-level error type for backup and restore operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The secret store rejected or failed an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// Transport to the secret store failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backup artifact has the wrong shape or format.
    #[error("Format error: {0}")]
    Format(String),

    /// Invalid run configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Value encoding or decoding failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
