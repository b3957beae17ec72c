//! Error types for the audit pipeline

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the audit pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// The gateway session ended with a fatal error
    #[error("Gateway connection error: {0}")]
    Connection(#[from] anyhow::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sink errors that could not be recovered locally
    #[error("Sink error: {0}")]
    Sink(String),
}
