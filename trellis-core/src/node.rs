//! RDF node model.
//!
//! A `Node` is one position of a subject-predicate-object statement. The
//! `Nothing` variant is the wildcard used in pattern matching; it is equal
//! only to itself and matches anything.

use crate::uri::Uri;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single RDF node.
///
/// Ordering compares the variant tag first (Nothing < Uri < Literal <
/// Blank), then the value, then the datatype, so nodes and triples sort
/// deterministically and wildcard patterns sort before any concrete node
/// sharing a prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Node {
    /// Wildcard / absent node
    #[default]
    Nothing,
    /// URI node holding an expanded URI
    Uri(Uri),
    /// Literal node with optional datatype
    Literal {
        value: String,
        datatype: Option<Uri>,
    },
    /// Blank node, valid only within one store instance's lifetime
    Blank(String),
}

impl Node {
    /// Construct a literal node with no datatype.
    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal {
            value: value.into(),
            datatype: None,
        }
    }

    /// Construct a literal node with the given datatype.
    pub fn typed_literal(value: impl Into<String>, datatype: Uri) -> Self {
        Node::Literal {
            value: value.into(),
            datatype: Some(datatype),
        }
    }

    /// Construct a blank node with the given id.
    pub fn blank(id: impl Into<String>) -> Self {
        Node::Blank(id.into())
    }

    /// True for the wildcard node.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Node::Nothing)
    }

    /// True for URI nodes.
    pub fn is_uri(&self) -> bool {
        matches!(self, Node::Uri(_))
    }

    /// True for literal nodes.
    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal { .. })
    }

    /// True for blank nodes.
    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Blank(_))
    }

    /// The URI, when this is a URI node.
    pub fn as_uri(&self) -> Option<&Uri> {
        match self {
            Node::Uri(u) => Some(u),
            _ => None,
        }
    }

    /// The literal value string, when this is a literal node.
    pub fn literal_value(&self) -> Option<&str> {
        match self {
            Node::Literal { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Wildcard unification: a pattern node matches a concrete node when
    /// it is `Nothing` or equal to it.
    pub fn matches(&self, concrete: &Node) -> bool {
        self.is_nothing() || self == concrete
    }
}

impl From<Uri> for Node {
    fn from(u: Uri) -> Self {
        Node::Uri(u)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Nothing => write!(f, "[]"),
            Node::Uri(u) => {
                if u.is_empty() {
                    write!(f, "[empty-uri]")
                } else {
                    write!(f, "{u}")
                }
            }
            Node::Literal { value, datatype } => {
                write!(f, "\"{value}\"")?;
                if let Some(dt) = datatype {
                    write!(f, "^^{dt}")?;
                }
                Ok(())
            }
            Node::Blank(id) => write!(f, "[blank {id}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::new(s).unwrap()
    }

    #[test]
    fn nothing_equals_only_itself() {
        assert_eq!(Node::Nothing, Node::Nothing);
        assert_ne!(Node::Nothing, Node::literal(""));
        assert_ne!(Node::Nothing, Node::blank(""));
    }

    #[test]
    fn literal_equality_includes_datatype() {
        let dt = uri(trellis_vocab::xsd::INTEGER);
        assert_ne!(Node::literal("4"), Node::typed_literal("4", dt.clone()));
        assert_eq!(
            Node::typed_literal("4", dt.clone()),
            Node::typed_literal("4", dt)
        );
    }

    #[test]
    fn ordering_is_tag_then_value_then_datatype() {
        let a = Node::Nothing;
        let b = Node::Uri(uri("http://example.com/a"));
        let c = Node::literal("x");
        let d = Node::blank("b0");
        assert!(a < b && b < c && c < d);

        let dt = uri(trellis_vocab::xsd::INTEGER);
        assert!(Node::literal("4") < Node::typed_literal("4", dt));
    }

    #[test]
    fn wildcard_matches_anything() {
        let n = Node::Uri(uri("http://example.com/a"));
        assert!(Node::Nothing.matches(&n));
        assert!(n.matches(&n));
        assert!(!n.matches(&Node::literal("a")));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Node::Nothing.to_string(), "[]");
        assert_eq!(
            Node::Uri(uri("http://example.com/a")).to_string(),
            "<http://example.com/a>"
        );
        assert_eq!(Node::literal("x").to_string(), "\"x\"");
        assert_eq!(Node::blank("b1").to_string(), "[blank b1]");
    }
}
