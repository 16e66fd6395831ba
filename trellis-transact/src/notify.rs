//! Commit notification.
//!
//! Listeners registered on a [`crate::TransactionalStore`] hear about
//! every committed change set, including those produced by auto-wrapped
//! direct writes. Emission happens after the store lock is released, so
//! a listener may observe other transactions having started before it
//! reacts. Listeners are held weakly; a dropped listener is pruned on
//! the next emission.

use std::sync::{Mutex, Weak};

use trellis_core::ChangeSet;

/// Receiver for transaction-committed notifications.
pub trait CommitListener: Send + Sync {
    /// Called once per committed transaction with its change set, after
    /// the store lock has been released.
    fn transaction_committed(&self, changes: &ChangeSet);
}

/// Handle identifying one listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub(crate) struct ListenerSet {
    entries: Mutex<Vec<(ListenerId, Weak<dyn CommitListener>)>>,
    next: std::sync::atomic::AtomicU64,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        ListenerSet {
            entries: Mutex::new(Vec::new()),
            next: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Weak<dyn CommitListener>)>> {
        match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn add(&self, listener: Weak<dyn CommitListener>) -> ListenerId {
        let id = ListenerId(
            self.next
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        );
        self.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) {
        self.lock().retain(|(entry, _)| *entry != id);
    }

    /// Snapshot the live listeners, pruning dead ones, then invoke each
    /// outside the listener lock.
    pub(crate) fn notify(&self, changes: &ChangeSet) {
        let live: Vec<_> = {
            let mut entries = self.lock();
            entries.retain(|(_, weak)| weak.strong_count() > 0);
            entries
                .iter()
                .filter_map(|(_, weak)| weak.upgrade())
                .collect()
        };
        for listener in live {
            listener.transaction_committed(changes);
        }
    }
}
