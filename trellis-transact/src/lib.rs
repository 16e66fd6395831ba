//! # Trellis Transact
//!
//! Transactional coordination over any `trellis_core::Store` backend:
//!
//! - `TransactionalStore` - one mutex, two views: the committed state
//!   for direct access, the provisional state for the active transaction
//! - `Transaction` - change-set-recording handle, auto-rollback on
//!   failure, `Active -> {Committed | RolledBack}`
//! - `Connection` - lazy-transaction convenience wrapper
//! - `CommitListener` - post-commit change-set notification
//!
//! One transaction may be active per store at a time; starting a second
//! fails with `TransactError::TransactionConflict` rather than queuing.

pub mod connection;
pub mod error;
pub mod notify;
pub mod store;
pub mod transaction;

// Re-exports
pub use connection::Connection;
pub use error::{Result, TransactError};
pub use notify::{CommitListener, ListenerId};
pub use store::{DirectWriteBehaviour, TransactionalStore};
pub use transaction::Transaction;
