//! Turtle (TTL) codec for store save and import.
//!
//! Covers the subset of Turtle the store itself round-trips: prefix and
//! base directives, IRIs and prefixed names, blank node labels, quoted
//! literals with optional datatypes, integer/decimal/boolean shorthand,
//! and `;`/`,` continuations. Collections and anonymous blank nodes are
//! rejected with an error naming the construct.

pub mod error;
pub mod lexer;
pub mod parser;

pub use error::{Result, TurtleError};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse_document, ParsedDocument};

use std::io::Write;

use crate::node::Node;
use crate::triple::Triple;
use crate::uri::Uri;

/// Serialize triples as a Turtle document.
///
/// Triples are expected sorted by subject (the store's natural order);
/// consecutive triples sharing a subject are grouped with `;`. URIs are
/// abbreviated through the prefix table where the remainder is a simple
/// local name, and `rdf:type` is written as `a`.
pub fn write_document(
    out: &mut dyn Write,
    base: Option<&Uri>,
    prefixes: &[(String, Uri)],
    triples: &[Triple],
) -> std::io::Result<()> {
    if let Some(base) = base {
        writeln!(out, "@base {base} .")?;
    }
    for (prefix, ns) in prefixes {
        writeln!(out, "@prefix {prefix}: {ns} .")?;
    }
    if (base.is_some() || !prefixes.is_empty()) && !triples.is_empty() {
        writeln!(out)?;
    }

    let mut current_subject: Option<&Node> = None;
    for t in triples {
        if current_subject == Some(&t.subject) {
            writeln!(out, " ;")?;
            write!(out, "    ")?;
        } else {
            if current_subject.is_some() {
                writeln!(out, " .")?;
            }
            write_term(out, &t.subject, prefixes)?;
            write!(out, " ")?;
            current_subject = Some(&t.subject);
        }
        write_predicate(out, &t.predicate, prefixes)?;
        write!(out, " ")?;
        write_term(out, &t.object, prefixes)?;
    }
    if current_subject.is_some() {
        writeln!(out, " .")?;
    }
    Ok(())
}

fn abbreviate<'a>(uri: &'a Uri, prefixes: &'a [(String, Uri)]) -> Option<(&'a str, &'a str)> {
    for (prefix, ns) in prefixes {
        if let Some(local) = uri.as_str().strip_prefix(ns.as_str()) {
            if !local.is_empty()
                && local
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
            {
                return Some((prefix, local));
            }
        }
    }
    None
}

fn write_predicate(
    out: &mut dyn Write,
    node: &Node,
    prefixes: &[(String, Uri)],
) -> std::io::Result<()> {
    if let Node::Uri(u) = node {
        if u.as_str() == trellis_vocab::rdf::TYPE {
            return write!(out, "a");
        }
    }
    write_term(out, node, prefixes)
}

fn write_term(out: &mut dyn Write, node: &Node, prefixes: &[(String, Uri)]) -> std::io::Result<()> {
    match node {
        Node::Uri(u) => match abbreviate(u, prefixes) {
            Some((prefix, local)) => write!(out, "{prefix}:{local}"),
            None => write!(out, "<{}>", u.as_str()),
        },
        Node::Blank(id) => write!(out, "_:{id}"),
        Node::Literal { value, datatype } => {
            write!(out, "\"")?;
            for ch in value.chars() {
                match ch {
                    '"' => write!(out, "\\\"")?,
                    '\\' => write!(out, "\\\\")?,
                    '\n' => write!(out, "\\n")?,
                    '\r' => write!(out, "\\r")?,
                    '\t' => write!(out, "\\t")?,
                    c => write!(out, "{c}")?,
                }
            }
            write!(out, "\"")?;
            if let Some(dt) = datatype {
                write!(out, "^^")?;
                match abbreviate(dt, prefixes) {
                    Some((prefix, local)) => write!(out, "{prefix}:{local}")?,
                    None => write!(out, "<{}>", dt.as_str())?,
                }
            }
            Ok(())
        }
        // Wildcards never reach serialization; the store only holds
        // complete triples.
        Node::Nothing => write!(out, "[]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Node {
        Node::Uri(Uri::new(s).unwrap())
    }

    #[test]
    fn writes_grouped_and_abbreviated() {
        let prefixes = vec![(
            "ex".to_string(),
            Uri::new("http://example.com/").unwrap(),
        )];
        let triples = vec![
            Triple::new(
                uri("http://example.com/s"),
                Node::Uri(Uri::rdf_type()),
                uri("http://example.com/Thing"),
            ),
            Triple::new(
                uri("http://example.com/s"),
                uri("http://example.com/name"),
                Node::literal("Alice \"A\"\n"),
            ),
        ];
        let mut out = Vec::new();
        write_document(&mut out, None, &prefixes, &triples).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("ex:s a ex:Thing ;"));
        assert!(text.contains("ex:name \"Alice \\\"A\\\"\\n\" ."));
    }

    #[test]
    fn non_ascii_iris_round_trip() {
        let triples = vec![Triple::new(
            uri("http://example.com/café"),
            uri("http://example.com/p"),
            Node::literal("naïve"),
        )];
        let mut out = Vec::new();
        write_document(&mut out, None, &[], &triples).unwrap();
        let doc = parse_document(&String::from_utf8(out).unwrap()).unwrap();
        assert_eq!(doc.triples, triples);
    }

    #[test]
    fn round_trips_through_the_parser() {
        let prefixes = vec![(
            "ex".to_string(),
            Uri::new("http://example.com/").unwrap(),
        )];
        let triples = vec![
            Triple::new(
                uri("http://example.com/s"),
                uri("http://example.com/p"),
                Node::typed_literal("4", Uri::from_expanded(trellis_vocab::xsd::INTEGER)),
            ),
            Triple::new(
                Node::Blank("b0".into()),
                uri("http://example.com/p"),
                uri("http://example.com/o"),
            ),
        ];
        let mut out = Vec::new();
        write_document(&mut out, None, &prefixes, &triples).unwrap();
        let doc = parse_document(&String::from_utf8(out).unwrap()).unwrap();
        assert_eq!(doc.triples, triples);
    }
}
