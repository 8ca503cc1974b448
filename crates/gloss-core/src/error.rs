//! Error types for the gloss pipeline.

use thiserror::Error;

/// Result type alias using gloss's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for gloss operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Completion/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model output did not match the expected structure
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Annotation storage collaborator failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Schema(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
