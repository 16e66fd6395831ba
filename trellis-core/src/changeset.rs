//! Change sets - the unit of transaction durability and commit
//! notification.
//!
//! A `ChangeSet` is an ordered sequence of add/remove operations. Order
//! is semantic: forward replay applies the operations first to last;
//! revert walks last to first with each operation inverted, which restores
//! the store's previous triple set exactly.

use crate::triple::Triple;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a change adds or removes its triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Add,
    Remove,
}

impl ChangeType {
    /// The opposite operation, used when reverting.
    pub fn inverted(self) -> Self {
        match self {
            ChangeType::Add => ChangeType::Remove,
            ChangeType::Remove => ChangeType::Add,
        }
    }
}

/// One add or remove operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub op: ChangeType,
    pub triple: Triple,
}

impl Change {
    /// An add operation.
    pub fn add(triple: Triple) -> Self {
        Change {
            op: ChangeType::Add,
            triple,
        }
    }

    /// A remove operation.
    pub fn remove(triple: Triple) -> Self {
        Change {
            op: ChangeType::Remove,
            triple,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            ChangeType::Add => write!(f, "+{}", self.triple),
            ChangeType::Remove => write!(f, "-{}", self.triple),
        }
    }
}

/// An ordered sequence of changes, as accumulated by one transaction.
pub type ChangeSet = Vec<Change>;
