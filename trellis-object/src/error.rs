//! Error types for trellis-object

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, MapperError>;

/// Object-mapping error type
#[derive(Error, Debug)]
pub enum MapperError {
    /// Error from the underlying store
    #[error("Store error: {0}")]
    Core(#[from] trellis_core::Error),

    /// Error from the transactional layer
    #[error("Transaction error: {0}")]
    Transact(#[from] trellis_transact::TransactError),

    /// No factory registration (or type-URI mapping) for a class
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// A registered factory failed to produce an instance
    #[error("Construction failed for class: {0}")]
    ConstructionFailed(String),

    /// An object passed to `manage` has no usable uri property
    #[error("Object has no uri property: {0}")]
    NoUri(String),

    /// The node/object maps disagree. A logic fault, never caught and
    /// continued from.
    #[error("Internal node/object mapping inconsistency: {0}")]
    InternalMappingInconsistency(String),
}
