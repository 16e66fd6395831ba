//! The transactional store.
//!
//! `TransactionalStore` wraps a backend [`Store`] behind one mutex - the
//! single serialization point for every operation - and serves two kinds
//! of caller from the same storage: work going through the active
//! [`crate::Transaction`], and direct access to the committed state.
//!
//! The trick is a binary context flag. In `Tx` context the active
//! transaction's accumulated change set is applied to the backend; in
//! `NonTx` context it is reverted. Every operation first forces the
//! store into the context it needs (a no-op when already there), so
//! neither view requires duplicating storage.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

use trellis_core::{
    ChangeSet, FeatureSet, ImportDuplicatesMode, Node, ResultSet, Store, Triple, Uri,
};

use crate::error::{Result, TransactError};
use crate::notify::{CommitListener, ListenerId, ListenerSet};
use crate::transaction::Transaction;

/// What a direct write on the store itself does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DirectWriteBehaviour {
    /// Wrap the single write in a fresh transaction and commit it.
    /// Fails with `TransactionConflict` while a transaction is
    /// outstanding.
    #[default]
    AutoTransaction,
    /// Refuse direct writes with `WriteOutsideTransaction`.
    NoAutoTransaction,
}

/// Whether the backend currently reflects the active transaction's
/// provisional changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Context {
    Tx,
    NonTx,
}

pub(crate) struct TxState {
    pub(crate) token: u64,
    pub(crate) changes: ChangeSet,
}

pub(crate) struct Inner {
    pub(crate) store: Box<dyn Store>,
    pub(crate) context: Context,
    pub(crate) current: Option<TxState>,
    next_token: u64,
}

impl Inner {
    /// Apply the active transaction's changes so the backend shows the
    /// provisional state. No-op when already in `Tx` context or when no
    /// transaction is active.
    pub(crate) fn enter_tx_context(&mut self) -> Result<()> {
        if self.context == Context::Tx {
            return Ok(());
        }
        if let Some(tx) = &self.current {
            self.store
                .change(&tx.changes)
                .map_err(|e| TransactError::ContextSwitch(e.to_string()))?;
        }
        self.context = Context::Tx;
        Ok(())
    }

    /// Revert the active transaction's changes so the backend shows the
    /// committed state. No-op when already in `NonTx` context or when no
    /// transaction is active.
    pub(crate) fn enter_non_tx_context(&mut self) -> Result<()> {
        if self.context == Context::NonTx {
            return Ok(());
        }
        if let Some(tx) = &self.current {
            self.store
                .revert(&tx.changes)
                .map_err(|e| TransactError::ContextSwitch(e.to_string()))?;
        }
        self.context = Context::NonTx;
        Ok(())
    }

    /// Append a change to the active transaction's record.
    pub(crate) fn record(&mut self, change: trellis_core::Change) {
        if let Some(tx) = self.current.as_mut() {
            tx.changes.push(change);
        }
    }

    /// Abandon the active transaction: revert its changes if applied,
    /// clear the current pointer, and hand back what was recorded.
    pub(crate) fn abandon(&mut self) -> ChangeSet {
        let changes = self
            .current
            .take()
            .map(|tx| tx.changes)
            .unwrap_or_default();
        if self.context == Context::Tx {
            if let Err(e) = self.store.revert(&changes) {
                // The recorded changes were applied to this very state,
                // so their inverse must apply; reaching here means the
                // backend lost consistency.
                tracing::error!(error = %e, "rollback failed to revert recorded changes");
            }
        }
        self.context = Context::NonTx;
        changes
    }
}

pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    pub(crate) listeners: ListenerSet,
}

impl Shared {
    pub(crate) fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A store serializing transactional and direct access to one backend.
pub struct TransactionalStore {
    shared: Arc<Shared>,
    direct_write: DirectWriteBehaviour,
}

impl TransactionalStore {
    /// Wrap a backend store.
    pub fn new(store: Box<dyn Store>, direct_write: DirectWriteBehaviour) -> Self {
        TransactionalStore {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    store,
                    context: Context::NonTx,
                    current: None,
                    next_token: 0,
                }),
                listeners: ListenerSet::new(),
            }),
            direct_write,
        }
    }

    /// Begin a transaction. Exactly one may be active per store; a
    /// second attempt fails immediately with `TransactionConflict`
    /// rather than queuing.
    pub fn start_transaction(&self) -> Result<Transaction> {
        let mut inner = self.shared.lock_inner();
        if inner.current.is_some() {
            return Err(TransactError::TransactionConflict);
        }
        let token = inner.next_token;
        inner.next_token += 1;
        inner.current = Some(TxState {
            token,
            changes: ChangeSet::new(),
        });
        // An empty change set makes both contexts identical; entering Tx
        // here is free and saves the first operation a switch.
        inner.context = Context::Tx;
        debug!(token, "transaction started");
        Ok(Transaction::new(Arc::clone(&self.shared), token))
    }

    /// Register a commit listener. Held weakly; drop the `Arc` to
    /// unregister implicitly, or call [`TransactionalStore::remove_listener`].
    pub fn add_listener<L: CommitListener + 'static>(&self, listener: &Arc<L>) -> ListenerId {
        let listener: Arc<dyn CommitListener> = Arc::clone(listener) as Arc<dyn CommitListener>;
        let weak: Weak<dyn CommitListener> = Arc::downgrade(&listener);
        self.shared.listeners.add(weak)
    }

    /// Unregister a commit listener.
    pub fn remove_listener(&self, id: ListenerId) {
        self.shared.listeners.remove(id);
    }

    /// True while a transaction is active on this store.
    pub fn has_active_transaction(&self) -> bool {
        self.shared.lock_inner().current.is_some()
    }

    fn read<R>(&self, f: impl FnOnce(&dyn Store) -> trellis_core::Result<R>) -> Result<R> {
        let mut inner = self.shared.lock_inner();
        inner.enter_non_tx_context()?;
        Ok(f(inner.store.as_ref())?)
    }

    fn auto_write<R>(&self, f: impl FnOnce(&mut Transaction) -> Result<R>) -> Result<R> {
        match self.direct_write {
            DirectWriteBehaviour::NoAutoTransaction => Err(TransactError::WriteOutsideTransaction),
            DirectWriteBehaviour::AutoTransaction => {
                let mut tx = self.start_transaction()?;
                let result = f(&mut tx)?;
                tx.commit()?;
                Ok(result)
            }
        }
    }

    /// Add a triple to the committed state, subject to the direct-write
    /// behaviour.
    pub fn add(&self, t: &Triple) -> Result<bool> {
        self.auto_write(|tx| tx.add(t))
    }

    /// Remove a triple (wildcard-aware) from the committed state,
    /// subject to the direct-write behaviour.
    pub fn remove(&self, t: &Triple) -> Result<bool> {
        self.auto_write(|tx| tx.remove(t))
    }

    /// Apply a change set to the committed state, subject to the
    /// direct-write behaviour.
    pub fn change(&self, changes: &ChangeSet) -> Result<()> {
        self.auto_write(|tx| tx.change(changes))
    }

    /// Revert a change set against the committed state, subject to the
    /// direct-write behaviour.
    pub fn revert(&self, changes: &ChangeSet) -> Result<()> {
        self.auto_write(|tx| tx.revert(changes))
    }

    /// Import a document into the committed state, subject to the
    /// direct-write behaviour. Holds the store lock for the duration.
    pub fn import(&self, path: &Path, mode: ImportDuplicatesMode) -> Result<()> {
        self.auto_write(|tx| tx.import(path, mode))
    }

    /// True when the committed state contains the triple.
    pub fn contains(&self, t: &Triple) -> Result<bool> {
        self.read(|s| s.contains(t))
    }

    /// All committed triples unifying with the pattern.
    pub fn match_pattern(&self, pattern: &Triple) -> Result<Vec<Triple>> {
        self.read(|s| s.match_pattern(pattern))
    }

    /// Some committed triple matching the pattern.
    pub fn match_once(&self, pattern: &Triple) -> Result<Option<Triple>> {
        self.read(|s| s.match_once(pattern))
    }

    /// Complete a single-wildcard pattern against the committed state.
    pub fn complete(&self, pattern: &Triple) -> Result<Node> {
        self.read(|s| s.complete(pattern))
    }

    /// Query the committed state. Optional backend capability.
    pub fn query(&self, sparql: &str) -> Result<ResultSet> {
        self.read(|s| s.query(sparql))
    }

    /// Query the committed state for one binding.
    pub fn query_once(&self, sparql: &str, binding: &str) -> Result<Option<Node>> {
        self.read(|s| s.query_once(sparql, binding))
    }

    /// A fresh URI unused as subject in the committed state.
    pub fn unique_uri(&self, prefix: &str) -> Result<Uri> {
        self.read(|s| s.unique_uri(prefix))
    }

    /// Allocate a blank node. Blank allocation is not transactional:
    /// the node exists regardless of any later rollback.
    pub fn add_blank_node(&self) -> Result<Node> {
        let mut inner = self.shared.lock_inner();
        Ok(inner.store.add_blank_node()?)
    }

    /// Expand a possibly-prefixed name through the backend's table.
    pub fn expand(&self, name: &str) -> Result<Uri> {
        let inner = self.shared.lock_inner();
        Ok(inner.store.expand(name)?)
    }

    /// Register a namespace prefix on the backend. The prefix table is
    /// not transactional.
    pub fn add_prefix(&self, prefix: &str, uri: &Uri) -> Result<()> {
        let mut inner = self.shared.lock_inner();
        Ok(inner.store.add_prefix(prefix, uri)?)
    }

    /// Save the committed state. Holds the store lock for the duration.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.read(|s| s.save(path))
    }

    /// The backend's feature set.
    pub fn features(&self) -> FeatureSet {
        self.shared.lock_inner().store.features()
    }
}

impl Store for TransactionalStore {
    fn add(&mut self, t: &Triple) -> trellis_core::Result<bool> {
        Ok(TransactionalStore::add(self, t)?)
    }

    fn remove(&mut self, t: &Triple) -> trellis_core::Result<bool> {
        Ok(TransactionalStore::remove(self, t)?)
    }

    fn change(&mut self, changes: &ChangeSet) -> trellis_core::Result<()> {
        Ok(TransactionalStore::change(self, changes)?)
    }

    fn revert(&mut self, changes: &ChangeSet) -> trellis_core::Result<()> {
        Ok(TransactionalStore::revert(self, changes)?)
    }

    fn contains(&self, t: &Triple) -> trellis_core::Result<bool> {
        Ok(TransactionalStore::contains(self, t)?)
    }

    fn match_pattern(&self, pattern: &Triple) -> trellis_core::Result<Vec<Triple>> {
        Ok(TransactionalStore::match_pattern(self, pattern)?)
    }

    fn match_once(&self, pattern: &Triple) -> trellis_core::Result<Option<Triple>> {
        Ok(TransactionalStore::match_once(self, pattern)?)
    }

    fn complete(&self, pattern: &Triple) -> trellis_core::Result<Node> {
        Ok(TransactionalStore::complete(self, pattern)?)
    }

    fn query(&self, sparql: &str) -> trellis_core::Result<ResultSet> {
        Ok(TransactionalStore::query(self, sparql)?)
    }

    fn query_once(&self, sparql: &str, binding: &str) -> trellis_core::Result<Option<Node>> {
        Ok(TransactionalStore::query_once(self, sparql, binding)?)
    }

    fn unique_uri(&self, prefix: &str) -> trellis_core::Result<Uri> {
        Ok(TransactionalStore::unique_uri(self, prefix)?)
    }

    fn add_blank_node(&mut self) -> trellis_core::Result<Node> {
        Ok(TransactionalStore::add_blank_node(self)?)
    }

    fn expand(&self, name: &str) -> trellis_core::Result<Uri> {
        Ok(TransactionalStore::expand(self, name)?)
    }

    fn add_prefix(&mut self, prefix: &str, uri: &Uri) -> trellis_core::Result<()> {
        Ok(TransactionalStore::add_prefix(self, prefix, uri)?)
    }

    fn save(&self, path: &Path) -> trellis_core::Result<()> {
        Ok(TransactionalStore::save(self, path)?)
    }

    fn import(&mut self, path: &Path, mode: ImportDuplicatesMode) -> trellis_core::Result<()> {
        Ok(TransactionalStore::import(self, path, mode)?)
    }

    fn features(&self) -> FeatureSet {
        TransactionalStore::features(self)
    }
}
