//! Error types for trellis-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core store error type
#[derive(Error, Debug)]
pub enum Error {
    /// URI string lacks a scheme and cannot be treated as absolute
    #[error("Incomplete URI: <{0}>")]
    IncompleteUri(String),

    /// Triple is not complete enough to insert or remove
    #[error("Incomplete statement: {0}")]
    IncompleteStatement(String),

    /// Duplicate triple found on import in fail-on-duplicates mode
    #[error("Duplicate statement encountered on import: {0}")]
    DuplicateImport(String),

    /// Operation requires a feature the backend does not support
    #[error("Operation not supported by this store: {0}")]
    UnsupportedFeature(&'static str),

    /// Turtle parse or serialization error
    #[error("Turtle error: {0}")]
    Turtle(#[from] crate::turtle::TurtleError),

    /// I/O error from save or import
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store-level failure with message
    #[error("Store error: {0}")]
    Store(String),

    /// Invariant violation inside the store machinery
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
