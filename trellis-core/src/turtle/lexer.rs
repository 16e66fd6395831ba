//! Tokenizer for the supported Turtle subset, built on winnow.
//!
//! Produces a flat token vector with byte positions; the parser walks it
//! with one token of lookahead. Fails fast on the first lexical error
//! with a message carrying line/column and source context. Constructs
//! outside the subset (collections, anonymous blank nodes, language
//! tags) are rejected with an error naming the construct.

use winnow::ascii::digit1;
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::stream::{AsChar, Location};
use winnow::token::{any, one_of, take_till, take_while};
use winnow::{LocatingSlice, ModalResult, Parser};

use super::error::{Result, TurtleError};

/// Input type for the lexer - tracks position for error reporting.
type Input<'a> = LocatingSlice<&'a str>;

/// One lexical token kind.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// `<...>` IRI reference (contents, not yet resolved)
    Iri(String),
    /// `prefix:local` name (either part may be empty)
    PName { prefix: String, local: String },
    /// `_:label` blank node
    BlankNode(String),
    /// Quoted string literal, unescaped
    StringLiteral(String),
    /// Bare integer literal
    Integer(String),
    /// Bare decimal literal
    Decimal(String),
    /// `true` / `false`
    Boolean(bool),
    /// The `a` keyword (rdf:type)
    A,
    /// `^^` datatype marker
    DatatypeMarker,
    /// `@prefix`
    PrefixDirective,
    /// `@base`
    BaseDirective,
    Dot,
    Semicolon,
    Comma,
    Eof,
}

/// A token with its starting byte position.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Tokenize the entire input.
///
/// Returns an error immediately on the first invalid token, providing
/// a message with line/column and source context.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut input = LocatingSlice::new(src);

    loop {
        skip_ws_and_comments(&mut input);
        let position = input.current_token_start();

        if input.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                position,
            });
            return Ok(tokens);
        }

        if let Some(construct) = unsupported_construct(&input) {
            return Err(TurtleError::unsupported(position, construct));
        }
        if input.starts_with('@') {
            let kind = lex_directive(&mut input, position)?;
            tokens.push(Token { kind, position });
            continue;
        }

        match next_token(&mut input) {
            Ok(kind) => tokens.push(Token { kind, position }),
            Err(_) => return Err(make_error(src, position, &input)),
        }
    }
}

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Name characters for blank node labels and prefixed-name parts.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

/// Characters that may appear unescaped inside an IRI reference.
fn is_iri_char(c: char) -> bool {
    !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | '\x00'..='\x20')
}

/// Skip whitespace and comments.
fn skip_ws_and_comments(input: &mut Input<'_>) {
    loop {
        let _: ModalResult<&str, ContextError> = take_while(0.., is_ws).parse_next(input);

        if input.starts_with('#') {
            let _: ModalResult<&str, ContextError> =
                take_till(0.., |c| c == '\n' || c == '\r').parse_next(input);
            let _: ModalResult<Option<char>, ContextError> =
                opt(one_of(['\n', '\r'])).parse_next(input);
        } else {
            break;
        }
    }
}

/// Constructs the subset deliberately leaves out, named for the error.
fn unsupported_construct(input: &Input<'_>) -> Option<&'static str> {
    match input.chars().next()? {
        '(' | ')' => Some("collection syntax"),
        '[' | ']' => Some("anonymous blank node syntax"),
        _ => None,
    }
}

/// Lex an `@` directive. Language tags are outside the subset.
fn lex_directive(input: &mut Input<'_>, position: usize) -> Result<TokenKind> {
    let word: ModalResult<&str, ContextError> = preceded(
        '@',
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-'),
    )
    .parse_next(input);
    match word {
        Ok("prefix") => Ok(TokenKind::PrefixDirective),
        Ok("base") => Ok(TokenKind::BaseDirective),
        Ok(other) => Err(TurtleError::unsupported(
            position,
            format!("@{other} (language tags and other directives)"),
        )),
        Err(_) => Err(TurtleError::lexer(position, "dangling '@'")),
    }
}

/// Parse the next token.
fn next_token(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    alt((
        // Multi-char marker (before single-char punctuation)
        parse_datatype_marker,
        parse_iri_ref,
        parse_blank_node_label,
        parse_string_literal,
        // Numbers before prefixed names; digits may open a name part
        parse_number,
        parse_pname_or_keyword,
        parse_punctuation,
    ))
    .parse_next(input)
}

fn parse_datatype_marker(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    "^^".map(|_| TokenKind::DatatypeMarker).parse_next(input)
}

/// Parse an IRI reference: `<...>`
fn parse_iri_ref(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    delimited('<', parse_iri_content, '>')
        .map(TokenKind::Iri)
        .parse_next(input)
}

/// Parse the content inside an IRI. Chunks are sliced straight from the
/// source, so multi-byte scalars pass through intact; `\u`/`\U` escapes
/// are decoded.
fn parse_iri_content(input: &mut Input<'_>) -> ModalResult<String> {
    let mut result = String::new();
    loop {
        let chunk: &str = take_while(0.., is_iri_char).parse_next(input)?;
        result.push_str(chunk);

        if input.starts_with('\\') {
            '\\'.parse_next(input)?;
            let marker: char = any.parse_next(input)?;
            let c = match marker {
                'u' => parse_unicode_escape(input, 4)?,
                'U' => parse_unicode_escape(input, 8)?,
                _ => return Err(ErrMode::Backtrack(ContextError::new())),
            };
            result.push(c);
        } else {
            break;
        }
    }
    Ok(result)
}

/// Parse the hex digits of a `\uXXXX` or `\UXXXXXXXX` escape.
fn parse_unicode_escape(input: &mut Input<'_>, digits: usize) -> ModalResult<char> {
    let hex: &str = take_while(digits..=digits, AsChar::is_hex_digit).parse_next(input)?;
    let code =
        u32::from_str_radix(hex, 16).map_err(|_| ErrMode::Backtrack(ContextError::new()))?;
    char::from_u32(code).ok_or_else(|| ErrMode::Backtrack(ContextError::new()))
}

/// Parse a blank node label: `_:name`
fn parse_blank_node_label(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    preceded("_:", take_while(1.., is_name_char))
        .map(|label: &str| TokenKind::BlankNode(label.to_string()))
        .parse_next(input)
}

/// Parse a double-quoted string literal.
fn parse_string_literal(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    delimited('"', parse_string_content, '"')
        .map(TokenKind::StringLiteral)
        .parse_next(input)
}

fn parse_string_content(input: &mut Input<'_>) -> ModalResult<String> {
    let mut result = String::new();
    loop {
        let chunk: &str = take_while(0.., |c| c != '"' && c != '\\' && c != '\n' && c != '\r')
            .parse_next(input)?;
        result.push_str(chunk);

        if input.starts_with('\\') {
            '\\'.parse_next(input)?;
            result.push(parse_escape_char(input)?);
        } else {
            break;
        }
    }
    Ok(result)
}

fn parse_escape_char(input: &mut Input<'_>) -> ModalResult<char> {
    let c: char = any.parse_next(input)?;
    match c {
        't' => Ok('\t'),
        'n' => Ok('\n'),
        'r' => Ok('\r'),
        '"' => Ok('"'),
        '\\' => Ok('\\'),
        'u' => parse_unicode_escape(input, 4),
        'U' => parse_unicode_escape(input, 8),
        _ => Err(ErrMode::Backtrack(ContextError::new())),
    }
}

/// Parse an integer or decimal literal, sign included.
fn parse_number(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    (
        opt(one_of(['+', '-'])),
        digit1,
        opt(preceded('.', digit1)),
    )
        .take()
        .map(|s: &str| match s.contains('.') {
            true => TokenKind::Decimal(s.to_string()),
            false => TokenKind::Integer(s.to_string()),
        })
        .parse_next(input)
}

/// Parse a prefixed name (`prefix:local`, either part possibly empty)
/// or one of the bare keywords `a`, `true`, `false`.
fn parse_pname_or_keyword(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let (word, colon): (&str, Option<char>) =
        (take_while(0.., is_name_char), opt(':')).parse_next(input)?;
    match colon {
        Some(_) => {
            let local: &str = take_while(0.., is_name_char).parse_next(input)?;
            Ok(TokenKind::PName {
                prefix: word.to_string(),
                local: local.to_string(),
            })
        }
        None => match word {
            "a" => Ok(TokenKind::A),
            "true" => Ok(TokenKind::Boolean(true)),
            "false" => Ok(TokenKind::Boolean(false)),
            _ => Err(ErrMode::Backtrack(ContextError::new())),
        },
    }
}

fn parse_punctuation(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    any.verify_map(|c| match c {
        '.' => Some(TokenKind::Dot),
        ';' => Some(TokenKind::Semicolon),
        ',' => Some(TokenKind::Comma),
        _ => None,
    })
    .parse_next(input)
}

/// Create a descriptive error message for an invalid token.
fn make_error(src: &str, position: usize, input: &Input<'_>) -> TurtleError {
    let bad_char = input.chars().next().unwrap_or('?');
    let (line, col) = line_col(src, position);
    let line_content = src.lines().nth(line.saturating_sub(1)).unwrap_or("");
    let pointer = " ".repeat(col.saturating_sub(1));
    let message = if bad_char == '"' {
        format!(
            "unterminated string literal at line {line}, column {col}\n  |\n{line} | {line_content}\n  | {pointer}^"
        )
    } else if bad_char == '<' {
        format!(
            "invalid or unterminated IRI at line {line}, column {col}\n  |\n{line} | {line_content}\n  | {pointer}^"
        )
    } else {
        format!(
            "unexpected character '{bad_char}' at line {line}, column {col}\n  |\n{line} | {line_content}\n  | {pointer}^"
        )
    };
    TurtleError::Lexer { position, message }
}

/// Convert a byte position to (line, column), 1-indexed.
fn line_col(src: &str, position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in src.char_indices() {
        if i >= position {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
