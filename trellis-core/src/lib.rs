//! # Trellis Core
//!
//! Data model and store contract for the Trellis RDF store:
//!
//! - `Node`, `Uri`, `Triple`, `ChangeSet` - the value model
//! - `Value` + `DatatypeRegistry` - typed-value round-trips for literals
//! - `Store` - the abstract capability contract
//! - `MemoryStore` - the in-memory reference backend with Turtle
//!   save/import
//!
//! Transaction coordination lives in `trellis-transact`; object-graph
//! mapping lives in `trellis-object`. Both consume any backend through
//! the [`Store`] trait.

pub mod changeset;
pub mod codec;
pub mod error;
pub mod memory;
pub mod node;
pub mod store;
pub mod triple;
pub mod turtle;
pub mod uri;
pub mod value;

// Re-exports
pub use changeset::{Change, ChangeSet, ChangeType};
pub use codec::{DatatypeRegistry, DecodeFn, EncodeFn, ValueEncoder};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use node::Node;
pub use store::{FeatureSet, ImportDuplicatesMode, QueryRow, ResultSet, Store};
pub use triple::Triple;
pub use uri::Uri;
pub use value::{ObjectId, Value};
