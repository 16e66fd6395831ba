//! Transaction handles.
//!
//! A `Transaction` is the only route for making changes visible to other
//! users of a [`crate::TransactionalStore`]. Its state machine is
//! `Active -> {Committed | RolledBack}`, both terminal; any operation on
//! a terminal handle fails with `TransactionMisuse`. Dropping an active
//! handle with recorded changes rolls it back and logs the misuse
//! (Rust cannot raise from `Drop`).

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use rustc_hash::FxHashMap;
use trellis_core::{
    turtle, Change, ChangeSet, FeatureSet, ImportDuplicatesMode, Node, ResultSet, Store, Triple,
    Uri,
};

use crate::error::{Result, TransactError};
use crate::store::{Inner, Shared};

enum Outcome {
    Committed(ChangeSet),
    RolledBack(ChangeSet),
}

/// An in-flight (or finished) transaction on a transactional store.
///
/// Reads through the handle always observe the provisional state -
/// the committed state plus this transaction's changes. Writes record
/// into the transaction's private change set; nothing becomes visible
/// to direct readers until [`Transaction::commit`].
pub struct Transaction {
    shared: Arc<Shared>,
    token: u64,
    outcome: Option<Outcome>,
}

impl Transaction {
    pub(crate) fn new(shared: Arc<Shared>, token: u64) -> Self {
        Transaction {
            shared,
            token,
            outcome: None,
        }
    }

    fn check_active(&self, inner: &Inner) -> Result<()> {
        if self.outcome.is_some() {
            return Err(TransactError::misuse(
                "operation on a committed or rolled-back transaction",
            ));
        }
        match &inner.current {
            Some(tx) if tx.token == self.token => Ok(()),
            _ => Err(TransactError::misuse(
                "transaction is no longer current on its store",
            )),
        }
    }

    /// Run a read in transactional context.
    fn read<R>(&self, f: impl FnOnce(&dyn Store) -> trellis_core::Result<R>) -> Result<R> {
        let mut inner = self.shared.lock_inner();
        self.check_active(&inner)?;
        inner.enter_tx_context()?;
        Ok(f(inner.store.as_ref())?)
    }

    /// Abandon on failure: the recorded changes are reverted, the
    /// transaction becomes terminal, and the error is re-raised.
    fn fail<R>(&mut self, inner: &mut Inner, e: impl Into<TransactError>) -> Result<R> {
        let changes = inner.abandon();
        warn!(token = self.token, "transaction failed, rolled back");
        self.outcome = Some(Outcome::RolledBack(changes));
        Err(e.into())
    }

    /// Add a triple. `Ok(false)` when it was already present in the
    /// provisional state; nothing is recorded then.
    pub fn add(&mut self, t: &Triple) -> Result<bool> {
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        self.check_active(inner)?;
        if let Err(e) = inner.enter_tx_context() {
            return self.fail(inner, e);
        }
        match inner.store.add(t) {
            Ok(false) => Ok(false),
            Ok(true) => {
                inner.record(Change::add(t.clone()));
                Ok(true)
            }
            Err(e) => self.fail(inner, e),
        }
    }

    /// Remove a triple. Wildcard patterns are expanded to the concrete
    /// matching triples first, so the change set replays exactly.
    pub fn remove(&mut self, t: &Triple) -> Result<bool> {
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        self.check_active(inner)?;
        if let Err(e) = inner.enter_tx_context() {
            return self.fail(inner, e);
        }
        if t.has_wildcard() {
            let matches = match inner.store.match_pattern(t) {
                Ok(m) => m,
                Err(e) => return self.fail(inner, e),
            };
            if matches.is_empty() {
                return Ok(false);
            }
            for m in matches {
                match inner.store.remove(&m) {
                    Ok(_) => inner.record(Change::remove(m)),
                    Err(e) => return self.fail(inner, e),
                }
            }
            Ok(true)
        } else {
            match inner.store.remove(t) {
                Ok(false) => Ok(false),
                Ok(true) => {
                    inner.record(Change::remove(t.clone()));
                    Ok(true)
                }
                Err(e) => self.fail(inner, e),
            }
        }
    }

    /// Apply a change set inside the transaction. All-or-nothing at the
    /// backend; a failure rolls the whole transaction back.
    pub fn change(&mut self, changes: &ChangeSet) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        self.check_active(inner)?;
        if let Err(e) = inner.enter_tx_context() {
            return self.fail(inner, e);
        }
        match inner.store.change(changes) {
            Ok(()) => {
                for c in changes {
                    inner.record(c.clone());
                }
                Ok(())
            }
            Err(e) => self.fail(inner, e),
        }
    }

    /// Revert a change set inside the transaction. Recorded as the
    /// inverted operations in reverse order, so forward replay of the
    /// transaction reproduces the revert.
    pub fn revert(&mut self, changes: &ChangeSet) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        self.check_active(inner)?;
        if let Err(e) = inner.enter_tx_context() {
            return self.fail(inner, e);
        }
        match inner.store.revert(changes) {
            Ok(()) => {
                for c in changes.iter().rev() {
                    inner.record(Change {
                        op: c.op.inverted(),
                        triple: c.triple.clone(),
                    });
                }
                Ok(())
            }
            Err(e) => self.fail(inner, e),
        }
    }

    /// Import a document through the transaction. The source is parsed
    /// up front; each triple then passes through the transaction,
    /// honoring the duplicate mode. `Fail` aborts at the first
    /// duplicate and rolls the transaction back.
    pub fn import(&mut self, path: &Path, mode: ImportDuplicatesMode) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(trellis_core::Error::Io)?;
        let doc = turtle::parse_document(&text).map_err(trellis_core::Error::Turtle)?;

        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        self.check_active(inner)?;
        if let Err(e) = inner.enter_tx_context() {
            return self.fail(inner, e);
        }

        for (prefix, ns) in &doc.prefixes {
            if let Err(e) = inner.store.add_prefix(prefix, ns) {
                return self.fail(inner, e);
            }
        }

        // Document blank labels get fresh store blanks, as on direct
        // import.
        let mut blanks: FxHashMap<String, Node> = FxHashMap::default();
        let mut triples = Vec::with_capacity(doc.triples.len());
        for t in doc.triples {
            let mut mapped = t;
            for node in [&mut mapped.subject, &mut mapped.object] {
                if let Node::Blank(label) = node {
                    let fresh = match blanks.get(label.as_str()) {
                        Some(n) => n.clone(),
                        None => match inner.store.add_blank_node() {
                            Ok(n) => {
                                blanks.insert(label.clone(), n.clone());
                                n
                            }
                            Err(e) => return self.fail(inner, e),
                        },
                    };
                    *node = fresh;
                }
            }
            triples.push(mapped);
        }

        for t in &triples {
            match inner.store.add(t) {
                Ok(true) => inner.record(Change::add(t.clone())),
                Ok(false) => {
                    if mode == ImportDuplicatesMode::Fail {
                        return self.fail(
                            inner,
                            trellis_core::Error::DuplicateImport(t.to_string()),
                        );
                    }
                }
                Err(e) => return self.fail(inner, e),
            }
        }
        debug!(token = self.token, count = triples.len(), "imported through transaction");
        Ok(())
    }

    /// Commit: the recorded changes become the store's permanent state
    /// and the transaction becomes terminal. The commit notification is
    /// emitted after the store lock is released; nothing is emitted for
    /// an empty transaction.
    pub fn commit(&mut self) -> Result<()> {
        let changes = {
            let shared = Arc::clone(&self.shared);
            let mut guard = shared.lock_inner();
            let inner = &mut *guard;
            self.check_active(inner)?;
            if let Err(e) = inner.enter_tx_context() {
                return self.fail(inner, e);
            }
            let changes = inner
                .current
                .take()
                .map(|tx| tx.changes)
                .unwrap_or_default();
            inner.context = crate::store::Context::NonTx;
            changes
        };
        debug!(token = self.token, changes = changes.len(), "committed");
        if !changes.is_empty() {
            self.shared.listeners.notify(&changes);
        }
        self.outcome = Some(Outcome::Committed(changes));
        Ok(())
    }

    /// Roll back: the recorded changes are reverted and the transaction
    /// becomes terminal. The changes stay readable via
    /// [`Transaction::changes`].
    pub fn rollback(&mut self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        self.check_active(inner)?;
        let changes = inner.abandon();
        debug!(token = self.token, changes = changes.len(), "rolled back");
        self.outcome = Some(Outcome::RolledBack(changes));
        Ok(())
    }

    /// The work recorded to date: the live change set while active, and
    /// everything that was recorded before commit or rollback once
    /// terminal - including changes that were subsequently undone.
    pub fn changes(&self) -> ChangeSet {
        match &self.outcome {
            Some(Outcome::Committed(c)) | Some(Outcome::RolledBack(c)) => c.clone(),
            None => {
                let inner = self.shared.lock_inner();
                match &inner.current {
                    Some(tx) if tx.token == self.token => tx.changes.clone(),
                    _ => ChangeSet::new(),
                }
            }
        }
    }

    /// The committed change set; empty unless this transaction
    /// committed.
    pub fn committed_changes(&self) -> ChangeSet {
        match &self.outcome {
            Some(Outcome::Committed(c)) => c.clone(),
            _ => ChangeSet::new(),
        }
    }

    /// True while the transaction may still accept operations.
    pub fn is_active(&self) -> bool {
        self.outcome.is_none()
    }

    /// True when the provisional state contains the triple.
    pub fn contains(&self, t: &Triple) -> Result<bool> {
        self.read(|s| s.contains(t))
    }

    /// All provisional triples unifying with the pattern.
    pub fn match_pattern(&self, pattern: &Triple) -> Result<Vec<Triple>> {
        self.read(|s| s.match_pattern(pattern))
    }

    /// Some provisional triple matching the pattern.
    pub fn match_once(&self, pattern: &Triple) -> Result<Option<Triple>> {
        self.read(|s| s.match_once(pattern))
    }

    /// Complete a single-wildcard pattern against the provisional state.
    pub fn complete(&self, pattern: &Triple) -> Result<Node> {
        self.read(|s| s.complete(pattern))
    }

    /// Query the provisional state. Optional backend capability.
    pub fn query(&self, sparql: &str) -> Result<ResultSet> {
        self.read(|s| s.query(sparql))
    }

    /// Query the provisional state for one binding.
    pub fn query_once(&self, sparql: &str, binding: &str) -> Result<Option<Node>> {
        self.read(|s| s.query_once(sparql, binding))
    }

    /// A fresh URI unused as subject in the provisional state.
    pub fn unique_uri(&self, prefix: &str) -> Result<Uri> {
        self.read(|s| s.unique_uri(prefix))
    }

    /// Allocate a blank node.
    pub fn add_blank_node(&mut self) -> Result<Node> {
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        self.check_active(inner)?;
        Ok(inner.store.add_blank_node()?)
    }

    /// Expand a possibly-prefixed name through the backend's table.
    pub fn expand(&self, name: &str) -> Result<Uri> {
        let inner = self.shared.lock_inner();
        Ok(inner.store.expand(name)?)
    }

    /// Register a namespace prefix on the backend.
    pub fn add_prefix(&mut self, prefix: &str, uri: &Uri) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        self.check_active(inner)?;
        Ok(inner.store.add_prefix(prefix, uri)?)
    }

    /// Save the provisional state - the committed state plus this
    /// transaction's changes.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.read(|s| s.save(path))
    }

    /// The backend's feature set.
    pub fn features(&self) -> FeatureSet {
        self.shared.lock_inner().store.features()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let mut guard = self.shared.lock_inner();
        let inner = &mut *guard;
        let ours = matches!(&inner.current, Some(tx) if tx.token == self.token);
        if !ours {
            return;
        }
        let changes = inner.abandon();
        if !changes.is_empty() {
            warn!(
                token = self.token,
                changes = changes.len(),
                "transaction dropped without commit or rollback; rolled back"
            );
        }
    }
}
