//! The abstract store contract.
//!
//! `Store` is the capability seam between everything above (transactions,
//! object mapping) and a statement-matching backend. The crate ships one
//! reference backend, [`crate::MemoryStore`]; the transactional layer and
//! the object mapper consume any implementation through this trait.

use rustc_hash::FxHashMap;
use std::path::Path;

use crate::changeset::ChangeSet;
use crate::error::Result;
use crate::node::Node;
use crate::triple::Triple;
use crate::uri::Uri;

/// One row of a query result: binding name to node.
pub type QueryRow = FxHashMap<String, Node>;

/// A sequence of query result rows.
pub type ResultSet = Vec<QueryRow>;

/// Behaviour when an imported triple already exists in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportDuplicatesMode {
    /// Discard duplicates without comment.
    Ignore,
    /// Fail with `Error::DuplicateImport`, importing nothing.
    Fail,
    /// Skip the duplicate tests entirely; what happens then is up to the
    /// backend (this crate's backend never stores a second copy).
    Permit,
}

/// The set of optional features a store implementation supports.
///
/// Callers must check for a feature before relying on it; a store without
/// the query feature raises `Error::UnsupportedFeature` from `query` and
/// `query_once`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureSet {
    /// Triples can be added and removed.
    pub modify: bool,
    /// SPARQL-shaped queries are available.
    pub query: bool,
    /// `import` accepts network URLs as well as local files.
    pub remote_import: bool,
}

/// Abstract interface for Trellis RDF stores.
pub trait Store: Send {
    /// Add a triple. Returns `Ok(false)` if the triple was already
    /// present; a store never holds duplicate triples. Fails with
    /// `Error::IncompleteStatement` for incomplete triples.
    fn add(&mut self, t: &Triple) -> Result<bool>;

    /// Remove a triple. If some nodes are wildcards, removes all matching
    /// triples. Returns `Ok(false)` if nothing matched.
    fn remove(&mut self, t: &Triple) -> Result<bool>;

    /// Atomically apply the sequence of changes. Any failure aborts the
    /// sequence and surfaces the first failing operation, leaving the
    /// store as it was before the call.
    fn change(&mut self, changes: &ChangeSet) -> Result<()>;

    /// Atomically apply the changes in reverse: last to first, adds
    /// removed and removes re-added. The exact inverse of [`Store::change`].
    fn revert(&mut self, changes: &ChangeSet) -> Result<()>;

    /// True when the store contains the given complete triple.
    fn contains(&self, t: &Triple) -> Result<bool>;

    /// All triples unifying with the wildcard pattern.
    fn match_pattern(&self, pattern: &Triple) -> Result<Vec<Triple>>;

    /// Some triple matching the pattern, or `None`. When several match,
    /// which one is returned is arbitrary.
    fn match_once(&self, pattern: &Triple) -> Result<Option<Triple>>;

    /// Given a pattern with exactly one wildcard position, return a node
    /// completing it to a triple present in the store, or `Node::Nothing`
    /// when none does. Errs unless exactly one position is a wildcard.
    fn complete(&self, pattern: &Triple) -> Result<Node>;

    /// Run a SPARQL query. Optional capability; check [`Store::features`].
    fn query(&self, sparql: &str) -> Result<ResultSet>;

    /// Run a SPARQL query and return the first result's node for the
    /// given binding name. Optional capability.
    fn query_once(&self, sparql: &str, binding: &str) -> Result<Option<Node>>;

    /// A new URI starting with the (prefix-expanded) prefix that no
    /// triple in the store currently uses as subject.
    fn unique_uri(&self, prefix: &str) -> Result<Uri>;

    /// Create and return a fresh blank node, valid only within this
    /// store instance's lifetime.
    fn add_blank_node(&mut self) -> Result<Node>;

    /// Expand a possibly-prefixed name to a canonical URI using the
    /// store's namespace table. This is the only sanctioned route from a
    /// prefixed string to a `Uri`.
    fn expand(&self, name: &str) -> Result<Uri>;

    /// Register a namespace prefix for `expand` and Turtle export.
    /// Replaces any existing binding of the same prefix.
    fn add_prefix(&mut self, prefix: &str, uri: &Uri) -> Result<()>;

    /// Export the store to a Turtle file, overwriting any existing file.
    fn save(&self, path: &Path) -> Result<()>;

    /// Import an RDF document into the store, in addition to its current
    /// contents, with the given duplicate handling.
    fn import(&mut self, path: &Path, mode: ImportDuplicatesMode) -> Result<()>;

    /// The optional features this implementation supports.
    fn features(&self) -> FeatureSet;
}
