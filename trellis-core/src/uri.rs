//! Validated absolute URI strings.
//!
//! A `Uri` always holds an expanded, canonical URI. Strings using
//! namespace prefixes (`ex:thing`, `:thing`) stay plain strings until a
//! store's namespace table expands them via `Store::expand` - nothing in
//! this module resolves prefixes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An expanded, absolute URI.
///
/// Construction validates that the string can stand alone: it must carry
/// a `scheme://` part, be the token `"a"` (shorthand for `rdf:type`), or
/// be a `file:` path, which is corrected to `file://` form.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    /// Validate and construct a `Uri` from an already-expanded string.
    ///
    /// Returns `Error::IncompleteUri` for relative or prefixed names;
    /// those must go through `Store::expand` first.
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s == "a" {
            return Ok(Self::rdf_type());
        }
        if let Some(rest) = s.strip_prefix("file:") {
            if !rest.starts_with("//") {
                return Ok(Uri(format!("file://{rest}")));
            }
            return Ok(Uri(s));
        }
        match s.find("://") {
            Some(i) if i > 0 => Ok(Uri(s)),
            _ => Err(Error::IncompleteUri(s)),
        }
    }

    /// The `rdf:type` URI.
    pub fn rdf_type() -> Self {
        Uri(trellis_vocab::rdf::TYPE.to_string())
    }

    /// The URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes of the URI string.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the default (empty) URI, which no valid `new` call produces.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Construct without validation.
    ///
    /// For callers that already hold a known-absolute URI string, such as
    /// the vocabulary constants or a just-concatenated namespace + local
    /// name. Not for user input.
    pub fn from_expanded(s: impl Into<String>) -> Self {
        Uri(s.into())
    }

    /// Concatenate this URI, treated as a namespace, with a local name.
    ///
    /// The namespace is absolute already, so the result is too.
    pub fn join(&self, local: &str) -> Uri {
        Uri(format!("{}{local}", self.0))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Uri> for String {
    fn from(u: Uri) -> String {
        u.0
    }
}

impl std::str::FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute() {
        let u = Uri::new("http://example.com/x").unwrap();
        assert_eq!(u.as_str(), "http://example.com/x");
    }

    #[test]
    fn expands_a_to_rdf_type() {
        assert_eq!(Uri::new("a").unwrap(), Uri::rdf_type());
    }

    #[test]
    fn corrects_file_scheme() {
        let u = Uri::new("file:/tmp/graph.ttl").unwrap();
        assert_eq!(u.as_str(), "file:///tmp/graph.ttl");
        let v = Uri::new("file:///tmp/graph.ttl").unwrap();
        assert_eq!(u, v);
    }

    #[test]
    fn rejects_relative_and_prefixed() {
        assert!(matches!(Uri::new("thing"), Err(Error::IncompleteUri(_))));
        assert!(matches!(Uri::new("ex:thing"), Err(Error::IncompleteUri(_))));
        assert!(matches!(Uri::new(":thing"), Err(Error::IncompleteUri(_))));
        assert!(matches!(Uri::new(""), Err(Error::IncompleteUri(_))));
    }
}
