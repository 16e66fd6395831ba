//! Single-thread convenience wrapper over a transactional store.
//!
//! A `Connection` lazily starts a transaction on the first mutating
//! call and funnels everything through it until [`Connection::commit`]
//! or [`Connection::rollback`]. Reads go through the live transaction
//! when one exists (observing provisional state) and directly to the
//! store otherwise. Dropping a connection commits outstanding work,
//! best-effort.

use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use trellis_core::{
    ChangeSet, FeatureSet, ImportDuplicatesMode, Node, ResultSet, Store, Triple, Uri,
};

use crate::error::{Result, TransactError};
use crate::notify::{CommitListener, ListenerId};
use crate::store::TransactionalStore;
use crate::transaction::Transaction;

/// A lazily-transactional view of one [`TransactionalStore`].
pub struct Connection {
    store: Arc<TransactionalStore>,
    tx: Option<Transaction>,
}

impl Connection {
    /// Open a connection on the store.
    pub fn new(store: Arc<TransactionalStore>) -> Self {
        Connection { store, tx: None }
    }

    /// The underlying transactional store.
    pub fn store(&self) -> &Arc<TransactionalStore> {
        &self.store
    }

    /// True while this connection has uncommitted work.
    pub fn has_pending_changes(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.changes().is_empty())
    }

    /// Register a commit listener on the underlying store. The listener
    /// hears all commits on the store, not only this connection's.
    pub fn add_listener<L: CommitListener + 'static>(&self, listener: &Arc<L>) -> ListenerId {
        self.store.add_listener(listener)
    }

    /// Unregister a commit listener.
    pub fn remove_listener(&self, id: ListenerId) {
        self.store.remove_listener(id);
    }

    fn transaction(&mut self) -> Result<&mut Transaction> {
        if self.tx.is_none() {
            self.tx = Some(self.store.start_transaction()?);
        }
        match self.tx.as_mut() {
            Some(tx) => Ok(tx),
            None => Err(TransactError::misuse("connection transaction vanished")),
        }
    }

    /// Run a mutating operation through the live (possibly just
    /// started) transaction. A failing operation has already rolled the
    /// transaction back, so the dead handle is discarded.
    fn write<R>(&mut self, f: impl FnOnce(&mut Transaction) -> Result<R>) -> Result<R> {
        let result = f(self.transaction()?);
        if result.is_err() {
            self.tx = None;
        }
        result
    }

    /// Add a triple through the connection's transaction.
    pub fn add(&mut self, t: &Triple) -> Result<bool> {
        self.write(|tx| tx.add(t))
    }

    /// Remove a triple (wildcard-aware) through the connection's
    /// transaction.
    pub fn remove(&mut self, t: &Triple) -> Result<bool> {
        self.write(|tx| tx.remove(t))
    }

    /// Apply a change set through the connection's transaction.
    pub fn change(&mut self, changes: &ChangeSet) -> Result<()> {
        self.write(|tx| tx.change(changes))
    }

    /// Revert a change set through the connection's transaction.
    pub fn revert(&mut self, changes: &ChangeSet) -> Result<()> {
        self.write(|tx| tx.revert(changes))
    }

    /// Import a document through the connection's transaction.
    pub fn import(&mut self, path: &Path, mode: ImportDuplicatesMode) -> Result<()> {
        self.write(|tx| tx.import(path, mode))
    }

    /// Allocate a blank node through the connection's transaction.
    pub fn add_blank_node(&mut self) -> Result<Node> {
        self.write(|tx| tx.add_blank_node())
    }

    /// Commit outstanding work. No-op without a live transaction.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(mut tx) = self.tx.take() {
            tx.commit()?;
        }
        Ok(())
    }

    /// Commit outstanding work and return the committed change set
    /// (empty when there was nothing to commit).
    pub fn commit_and_obtain(&mut self) -> Result<ChangeSet> {
        match self.tx.take() {
            Some(mut tx) => {
                tx.commit()?;
                Ok(tx.committed_changes())
            }
            None => Ok(ChangeSet::new()),
        }
    }

    /// Discard outstanding work. No-op without a live transaction.
    pub fn rollback(&mut self) -> Result<()> {
        if let Some(mut tx) = self.tx.take() {
            tx.rollback()?;
        }
        Ok(())
    }

    /// True when this connection's view contains the triple.
    pub fn contains(&self, t: &Triple) -> Result<bool> {
        match &self.tx {
            Some(tx) => tx.contains(t),
            None => self.store.contains(t),
        }
    }

    /// All triples in this connection's view unifying with the pattern.
    pub fn match_pattern(&self, pattern: &Triple) -> Result<Vec<Triple>> {
        match &self.tx {
            Some(tx) => tx.match_pattern(pattern),
            None => self.store.match_pattern(pattern),
        }
    }

    /// Some triple in this connection's view matching the pattern.
    pub fn match_once(&self, pattern: &Triple) -> Result<Option<Triple>> {
        match &self.tx {
            Some(tx) => tx.match_once(pattern),
            None => self.store.match_once(pattern),
        }
    }

    /// Complete a single-wildcard pattern against this connection's
    /// view.
    pub fn complete(&self, pattern: &Triple) -> Result<Node> {
        match &self.tx {
            Some(tx) => tx.complete(pattern),
            None => self.store.complete(pattern),
        }
    }

    /// Query this connection's view. Optional backend capability.
    pub fn query(&self, sparql: &str) -> Result<ResultSet> {
        match &self.tx {
            Some(tx) => tx.query(sparql),
            None => self.store.query(sparql),
        }
    }

    /// Query this connection's view for one binding.
    pub fn query_once(&self, sparql: &str, binding: &str) -> Result<Option<Node>> {
        match &self.tx {
            Some(tx) => tx.query_once(sparql, binding),
            None => self.store.query_once(sparql, binding),
        }
    }

    /// A fresh URI unused as subject in this connection's view.
    pub fn unique_uri(&self, prefix: &str) -> Result<Uri> {
        match &self.tx {
            Some(tx) => tx.unique_uri(prefix),
            None => self.store.unique_uri(prefix),
        }
    }

    /// Expand a possibly-prefixed name through the backend's table.
    pub fn expand(&self, name: &str) -> Result<Uri> {
        self.store.expand(name)
    }

    /// Register a namespace prefix on the backend.
    pub fn add_prefix(&mut self, prefix: &str, uri: &Uri) -> Result<()> {
        self.store.add_prefix(prefix, uri)
    }

    /// Save this connection's view - provisional state when a
    /// transaction is live, committed state otherwise.
    pub fn save(&self, path: &Path) -> Result<()> {
        match &self.tx {
            Some(tx) => tx.save(path),
            None => self.store.save(path),
        }
    }

    /// The backend's feature set.
    pub fn features(&self) -> FeatureSet {
        self.store.features()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(mut tx) = self.tx.take() {
            if let Err(e) = tx.commit() {
                warn!(error = %e, "connection drop: auto-commit failed");
            }
        }
    }
}

impl Store for Connection {
    fn add(&mut self, t: &Triple) -> trellis_core::Result<bool> {
        Ok(Connection::add(self, t)?)
    }

    fn remove(&mut self, t: &Triple) -> trellis_core::Result<bool> {
        Ok(Connection::remove(self, t)?)
    }

    fn change(&mut self, changes: &ChangeSet) -> trellis_core::Result<()> {
        Ok(Connection::change(self, changes)?)
    }

    fn revert(&mut self, changes: &ChangeSet) -> trellis_core::Result<()> {
        Ok(Connection::revert(self, changes)?)
    }

    fn contains(&self, t: &Triple) -> trellis_core::Result<bool> {
        Ok(Connection::contains(self, t)?)
    }

    fn match_pattern(&self, pattern: &Triple) -> trellis_core::Result<Vec<Triple>> {
        Ok(Connection::match_pattern(self, pattern)?)
    }

    fn match_once(&self, pattern: &Triple) -> trellis_core::Result<Option<Triple>> {
        Ok(Connection::match_once(self, pattern)?)
    }

    fn complete(&self, pattern: &Triple) -> trellis_core::Result<Node> {
        Ok(Connection::complete(self, pattern)?)
    }

    fn query(&self, sparql: &str) -> trellis_core::Result<ResultSet> {
        Ok(Connection::query(self, sparql)?)
    }

    fn query_once(&self, sparql: &str, binding: &str) -> trellis_core::Result<Option<Node>> {
        Ok(Connection::query_once(self, sparql, binding)?)
    }

    fn unique_uri(&self, prefix: &str) -> trellis_core::Result<Uri> {
        Ok(Connection::unique_uri(self, prefix)?)
    }

    fn add_blank_node(&mut self) -> trellis_core::Result<Node> {
        Ok(Connection::add_blank_node(self)?)
    }

    fn expand(&self, name: &str) -> trellis_core::Result<Uri> {
        Ok(Connection::expand(self, name)?)
    }

    fn add_prefix(&mut self, prefix: &str, uri: &Uri) -> trellis_core::Result<()> {
        Ok(Connection::add_prefix(self, prefix, uri)?)
    }

    fn save(&self, path: &Path) -> trellis_core::Result<()> {
        Ok(Connection::save(self, path)?)
    }

    fn import(&mut self, path: &Path, mode: ImportDuplicatesMode) -> trellis_core::Result<()> {
        Ok(Connection::import(self, path, mode)?)
    }

    fn features(&self) -> FeatureSet {
        Connection::features(self)
    }
}
