//! Error types for rvsync.

use thiserror::Error;

/// Result type alias using rvsync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rvsync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Upstream registry answered with a non-success status
    #[error("Upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operator conflict resolution could not produce a decision
    #[error("Conflict resolution error: {0}")]
    Resolution(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File or console I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a retry of the same upstream request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Request(_) | Error::Serialization(_) | Error::UpstreamStatus { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
