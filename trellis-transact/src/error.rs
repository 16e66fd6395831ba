//! Error types for trellis-transact

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, TransactError>;

/// Transactional store error type
#[derive(Error, Debug)]
pub enum TransactError {
    /// Error from the underlying store
    #[error("Store error: {0}")]
    Core(#[from] trellis_core::Error),

    /// A second transaction was started while one is active
    #[error("Transaction conflict: a transaction is already active on this store")]
    TransactionConflict,

    /// A transaction handle was used after commit or rollback, or is no
    /// longer the store's current transaction
    #[error("Transaction misuse: {0}")]
    TransactionMisuse(String),

    /// Direct write on a store configured with `NoAutoTransaction`
    #[error("Write refused outside a transaction")]
    WriteOutsideTransaction,

    /// Replaying or reverting the active change set failed while
    /// switching between transactional and direct context
    #[error("Context switch failed: {0}")]
    ContextSwitch(String),
}

impl TransactError {
    /// Create a misuse error
    pub fn misuse(msg: impl Into<String>) -> Self {
        TransactError::TransactionMisuse(msg.into())
    }
}

// Lets transactional stores satisfy the core `Store` contract: typed
// transact errors degrade to store errors at that seam.
impl From<TransactError> for trellis_core::Error {
    fn from(e: TransactError) -> Self {
        match e {
            TransactError::Core(inner) => inner,
            other => trellis_core::Error::store(other.to_string()),
        }
    }
}
