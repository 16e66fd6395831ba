//! Recursive-descent parser over the token stream.
//!
//! Emits plain triples plus the prefix/base directives encountered, so a
//! store can merge the document's namespace table with its own.

use rustc_hash::FxHashMap;

use super::error::{Result, TurtleError};
use super::lexer::{tokenize, Token, TokenKind};
use crate::node::Node;
use crate::triple::Triple;
use crate::uri::Uri;

/// A parsed Turtle document.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    /// Base IRI from an @base directive, if any
    pub base: Option<Uri>,
    /// Prefix table accumulated from @prefix directives, in order
    pub prefixes: Vec<(String, Uri)>,
    /// All triples, in document order
    pub triples: Vec<Triple>,
}

/// Parse a Turtle document in the supported subset.
pub fn parse_document(input: &str) -> Result<ParsedDocument> {
    Parser::new(input)?.parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    prefixes: FxHashMap<String, Uri>,
    base: Option<Uri>,
    doc: ParsedDocument,
}

impl Parser {
    fn new(input: &str) -> Result<Self> {
        Ok(Parser {
            tokens: tokenize(input)?,
            pos: 0,
            prefixes: FxHashMap::default(),
            base: None,
            doc: ParsedDocument::default(),
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_dot(&mut self) -> Result<()> {
        let t = self.bump();
        match t.kind {
            TokenKind::Dot => Ok(()),
            other => Err(TurtleError::parse(
                t.position,
                format!("expected '.', found {other:?}"),
            )),
        }
    }

    fn parse(mut self) -> Result<ParsedDocument> {
        loop {
            match &self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::PrefixDirective => self.parse_prefix()?,
                TokenKind::BaseDirective => self.parse_base()?,
                _ => self.parse_statement()?,
            }
        }
        self.doc.base = self.base.take();
        Ok(self.doc)
    }

    fn parse_prefix(&mut self) -> Result<()> {
        self.bump(); // @prefix
        let t = self.bump();
        let prefix = match t.kind {
            TokenKind::PName { prefix, local } if local.is_empty() => prefix,
            other => {
                return Err(TurtleError::parse(
                    t.position,
                    format!("expected prefix name, found {other:?}"),
                ))
            }
        };
        let t = self.bump();
        let uri = match t.kind {
            TokenKind::Iri(iri) => self.resolve_iri(&iri, t.position)?,
            other => {
                return Err(TurtleError::parse(
                    t.position,
                    format!("expected namespace IRI, found {other:?}"),
                ))
            }
        };
        self.expect_dot()?;
        self.prefixes.insert(prefix.clone(), uri.clone());
        self.doc.prefixes.push((prefix, uri));
        Ok(())
    }

    fn parse_base(&mut self) -> Result<()> {
        self.bump(); // @base
        let t = self.bump();
        match t.kind {
            TokenKind::Iri(iri) => {
                let uri = Uri::new(iri.clone())
                    .map_err(|_| TurtleError::IriResolution(format!("base IRI <{iri}> is not absolute")))?;
                self.base = Some(uri);
            }
            other => {
                return Err(TurtleError::parse(
                    t.position,
                    format!("expected base IRI, found {other:?}"),
                ))
            }
        }
        self.expect_dot()
    }

    fn parse_statement(&mut self) -> Result<()> {
        let subject = self.parse_subject()?;
        loop {
            let predicate = self.parse_predicate()?;
            loop {
                let object = self.parse_object()?;
                self.doc.triples.push(Triple {
                    subject: subject.clone(),
                    predicate: predicate.clone(),
                    object,
                });
                match self.peek().kind {
                    TokenKind::Comma => {
                        self.bump();
                    }
                    _ => break,
                }
            }
            match self.peek().kind {
                TokenKind::Semicolon => {
                    self.bump();
                    // allow a trailing ';' before '.'
                    if matches!(self.peek().kind, TokenKind::Dot) {
                        break;
                    }
                }
                _ => break,
            }
        }
        self.expect_dot()
    }

    fn parse_subject(&mut self) -> Result<Node> {
        let t = self.bump();
        match t.kind {
            TokenKind::Iri(iri) => Ok(Node::Uri(self.resolve_iri(&iri, t.position)?)),
            TokenKind::PName { prefix, local } => {
                Ok(Node::Uri(self.resolve_pname(&prefix, &local)?))
            }
            TokenKind::BlankNode(label) => Ok(Node::Blank(label)),
            other => Err(TurtleError::parse(
                t.position,
                format!("expected subject, found {other:?}"),
            )),
        }
    }

    fn parse_predicate(&mut self) -> Result<Node> {
        let t = self.bump();
        match t.kind {
            TokenKind::A => Ok(Node::Uri(Uri::rdf_type())),
            TokenKind::Iri(iri) => Ok(Node::Uri(self.resolve_iri(&iri, t.position)?)),
            TokenKind::PName { prefix, local } => {
                Ok(Node::Uri(self.resolve_pname(&prefix, &local)?))
            }
            other => Err(TurtleError::parse(
                t.position,
                format!("expected predicate, found {other:?}"),
            )),
        }
    }

    fn parse_object(&mut self) -> Result<Node> {
        let t = self.bump();
        match t.kind {
            TokenKind::Iri(iri) => Ok(Node::Uri(self.resolve_iri(&iri, t.position)?)),
            TokenKind::PName { prefix, local } => {
                Ok(Node::Uri(self.resolve_pname(&prefix, &local)?))
            }
            TokenKind::BlankNode(label) => Ok(Node::Blank(label)),
            TokenKind::Integer(digits) => Ok(Node::typed_literal(
                digits,
                Uri::from_expanded(trellis_vocab::xsd::INTEGER),
            )),
            TokenKind::Decimal(digits) => Ok(Node::typed_literal(
                digits,
                Uri::from_expanded(trellis_vocab::xsd::DECIMAL),
            )),
            TokenKind::Boolean(b) => Ok(Node::typed_literal(
                if b { "true" } else { "false" },
                Uri::from_expanded(trellis_vocab::xsd::BOOLEAN),
            )),
            TokenKind::StringLiteral(value) => {
                if matches!(self.peek().kind, TokenKind::DatatypeMarker) {
                    self.bump();
                    let dt = self.bump();
                    let datatype = match dt.kind {
                        TokenKind::Iri(iri) => self.resolve_iri(&iri, dt.position)?,
                        TokenKind::PName { prefix, local } => {
                            self.resolve_pname(&prefix, &local)?
                        }
                        other => {
                            return Err(TurtleError::parse(
                                dt.position,
                                format!("expected datatype IRI, found {other:?}"),
                            ))
                        }
                    };
                    Ok(Node::typed_literal(value, datatype))
                } else {
                    Ok(Node::literal(value))
                }
            }
            other => Err(TurtleError::parse(
                t.position,
                format!("expected object, found {other:?}"),
            )),
        }
    }

    fn resolve_iri(&self, iri: &str, position: usize) -> Result<Uri> {
        if let Ok(u) = Uri::new(iri) {
            return Ok(u);
        }
        match &self.base {
            Some(base) => Ok(Uri::from_expanded(format!("{}{iri}", base.as_str()))),
            None => Err(TurtleError::parse(
                position,
                format!("relative IRI <{iri}> with no base"),
            )),
        }
    }

    fn resolve_pname(&self, prefix: &str, local: &str) -> Result<Uri> {
        match self.prefixes.get(prefix) {
            Some(ns) => Ok(Uri::from_expanded(format!("{}{local}", ns.as_str()))),
            None => Err(TurtleError::UndefinedPrefix(prefix.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_statements() {
        let doc = parse_document(
            "@prefix ex: <http://example.com/> .\n\
             ex:s a ex:Thing ;\n\
                 ex:name \"Alice\" , \"Alys\" ;\n\
                 ex:age 30 .\n",
        )
        .unwrap();
        assert_eq!(doc.prefixes.len(), 1);
        assert_eq!(doc.triples.len(), 4);
        assert_eq!(
            doc.triples[0],
            Triple::new(
                Node::Uri(Uri::new("http://example.com/s").unwrap()),
                Node::Uri(Uri::rdf_type()),
                Node::Uri(Uri::new("http://example.com/Thing").unwrap()),
            )
        );
        assert_eq!(doc.triples[2].object, Node::literal("Alys"));
        assert_eq!(
            doc.triples[3].object,
            Node::typed_literal("30", Uri::from_expanded(trellis_vocab::xsd::INTEGER))
        );
    }

    #[test]
    fn resolves_relative_iris_against_base() {
        let doc = parse_document(
            "@base <http://example.com/> .\n<s> <p> <o> .\n",
        )
        .unwrap();
        assert_eq!(doc.base.as_ref().unwrap().as_str(), "http://example.com/");
        assert_eq!(
            doc.triples[0].subject,
            Node::Uri(Uri::new("http://example.com/s").unwrap())
        );
    }

    #[test]
    fn datatyped_literals_and_blanks() {
        let doc = parse_document(
            "_:b0 <http://e/p> \"4\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n",
        )
        .unwrap();
        assert_eq!(doc.triples[0].subject, Node::Blank("b0".into()));
        assert_eq!(
            doc.triples[0].object,
            Node::typed_literal("4", Uri::from_expanded(trellis_vocab::xsd::INTEGER))
        );
    }

    #[test]
    fn undefined_prefix_is_an_error() {
        let err = parse_document("nope:s <http://e/p> \"x\" .").unwrap_err();
        assert!(matches!(err, TurtleError::UndefinedPrefix(p) if p == "nope"));
    }

    #[test]
    fn relative_iri_without_base_is_an_error() {
        let err = parse_document("<s> <http://e/p> \"x\" .").unwrap_err();
        assert!(matches!(err, TurtleError::Parse { .. }));
    }
}
