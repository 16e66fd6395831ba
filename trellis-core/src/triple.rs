//! Triples - the store's atomic fact unit.

use crate::error::{Error, Result};
use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A subject-predicate-object statement.
///
/// Any position may hold `Node::Nothing` when the triple is used as a
/// wildcard pattern; a triple must be complete (see [`Triple::check_complete`])
/// before it can be inserted into or removed from a store.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Node,
    pub predicate: Node,
    pub object: Node,
}

impl Triple {
    /// Construct a triple from its three nodes.
    pub fn new(
        subject: impl Into<Node>,
        predicate: impl Into<Node>,
        object: impl Into<Node>,
    ) -> Self {
        Triple {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// The all-wildcard pattern matching every triple.
    pub fn wildcard() -> Self {
        Triple::default()
    }

    /// True when any position is a wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.subject.is_nothing() || self.predicate.is_nothing() || self.object.is_nothing()
    }

    /// Check the completeness rule for insertion and removal: subject is
    /// a URI or blank node, predicate is a URI, object is a URI, blank,
    /// or literal node.
    pub fn check_complete(&self) -> Result<()> {
        let subject_ok = self.subject.is_uri() || self.subject.is_blank();
        let predicate_ok = self.predicate.is_uri();
        let object_ok =
            self.object.is_uri() || self.object.is_blank() || self.object.is_literal();
        if subject_ok && predicate_ok && object_ok {
            Ok(())
        } else {
            Err(Error::IncompleteStatement(self.to_string()))
        }
    }

    /// Wildcard unification of this pattern against a concrete triple.
    pub fn matches(&self, concrete: &Triple) -> bool {
        self.subject.matches(&concrete.subject)
            && self.predicate.matches(&concrete.predicate)
            && self.object.matches(&concrete.object)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::Uri;

    fn uri(s: &str) -> Node {
        Node::Uri(Uri::new(s).unwrap())
    }

    #[test]
    fn completeness_rule() {
        let p = uri("http://example.com/p");
        assert!(Triple::new(uri("http://example.com/s"), p.clone(), Node::literal("x"))
            .check_complete()
            .is_ok());
        assert!(Triple::new(Node::blank("b0"), p.clone(), Node::blank("b1"))
            .check_complete()
            .is_ok());

        // literal subject, literal predicate, wildcard object all fail
        assert!(Triple::new(Node::literal("s"), p.clone(), Node::literal("x"))
            .check_complete()
            .is_err());
        assert!(Triple::new(uri("http://example.com/s"), Node::literal("p"), Node::literal("x"))
            .check_complete()
            .is_err());
        assert!(Triple::new(uri("http://example.com/s"), p, Node::Nothing)
            .check_complete()
            .is_err());
    }

    #[test]
    fn wildcard_matching() {
        let t = Triple::new(
            uri("http://example.com/s"),
            uri("http://example.com/p"),
            Node::literal("x"),
        );
        assert!(Triple::wildcard().matches(&t));
        assert!(Triple::new(t.subject.clone(), Node::Nothing, Node::Nothing).matches(&t));
        assert!(!Triple::new(t.subject.clone(), Node::Nothing, Node::literal("y")).matches(&t));
    }
}
