//! Streaming decoder: store text to a typed map.
//!
//! The reader is consumed one physical line at a time; only the current line
//! and one line of lookahead are held in memory. Nesting is recovered from
//! indentation: a key or `-` without an inline scalar opens a block made of
//! the following, more deeply indented lines.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::io::BufRead;

use serde::de::DeserializeOwned;

use super::de::from_node;
use super::node::{Key, Node, Scalar};
use super::token::{Token, Tokenizer};
use crate::error::{FormatError, Result};

/// One non-blank line, already tokenized.
#[derive(Debug)]
struct Line {
    number: usize,
    indent: usize,
    kind: LineKind,
}

#[derive(Debug)]
enum LineKind {
    /// `key:` or `key: scalar`
    Entry { key: Scalar, value: Option<Node> },
    /// `-` or `- scalar`
    Item { value: Option<Node> },
}

/// Decodes store text from any buffered reader.
pub struct Decoder<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
    peeked: Option<Line>,
    blank_lines: usize,
}

impl<R: BufRead> Decoder<R> {
    /// Creates a decoder reading from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
            peeked: None,
            blank_lines: 0,
        }
    }

    /// Number of blank or comment-only lines skipped so far.
    pub fn blank_lines(&self) -> usize {
        self.blank_lines
    }

    /// Decodes the whole input into a map. A key repeated later in the input
    /// replaces the earlier value.
    pub fn decode<K, V, S>(&mut self) -> Result<HashMap<K, V, S>>
    where
        K: Key,
        V: DeserializeOwned,
        S: BuildHasher + Default,
    {
        let mut map = HashMap::default();
        while let Some((line, scalar, node)) = self.next_entry()? {
            let found = scalar.to_string();
            let key = K::from_scalar(scalar).ok_or_else(|| FormatError::TypeMismatch {
                line,
                message: format!(
                    "expected {} key, found {}",
                    if K::NUMERIC { "integer" } else { "string" },
                    found
                ),
            })?;
            let value = from_node(node).map_err(|err| FormatError::TypeMismatch {
                line,
                message: err.to_string(),
            })?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Decodes the top-level mapping without converting it, keeping file
    /// order and the line number of every entry.
    pub fn decode_entries(&mut self) -> Result<Vec<(usize, Scalar, Node)>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Next top-level entry with the line its key sits on.
    fn next_entry(&mut self) -> Result<Option<(usize, Scalar, Node)>> {
        let Some(line) = self.take()? else {
            return Ok(None);
        };
        if line.indent != 0 {
            return Err(FormatError::BadIndent { line: line.number }.into());
        }
        match line.kind {
            LineKind::Entry { key, value } => {
                let node = self.value(value, 0)?;
                Ok(Some((line.number, key, node)))
            }
            LineKind::Item { .. } => Err(FormatError::UnexpectedToken {
                line: line.number,
                found: Token::Dash.to_string(),
            }
            .into()),
        }
    }

    /// Value of an entry or item whose line sits at `indent`.
    fn value(&mut self, inline: Option<Node>, indent: usize) -> Result<Node> {
        if let Some(node) = inline {
            return Ok(node);
        }
        match self.peek()? {
            Some(next) if next.indent > indent => {
                let indent = next.indent;
                self.block(indent)
            }
            _ => Ok(Node::null()),
        }
    }

    /// A run of sibling lines at exactly `indent`.
    fn block(&mut self, indent: usize) -> Result<Node> {
        let is_seq = matches!(self.peek()?, Some(Line { kind: LineKind::Item { .. }, .. }));
        let mut items = Vec::new();
        let mut entries = Vec::new();

        loop {
            match self.peek()? {
                Some(next) if next.indent == indent => {}
                Some(next) if next.indent > indent => {
                    return Err(FormatError::BadIndent { line: next.number }.into());
                }
                _ => break,
            }
            let Some(line) = self.take()? else { break };

            match (line.kind, is_seq) {
                (LineKind::Item { value }, true) => items.push(self.value(value, indent)?),
                (LineKind::Entry { key, value }, false) => {
                    let node = self.value(value, indent)?;
                    entries.push((key, node));
                }
                (LineKind::Item { .. }, false) => {
                    return Err(FormatError::UnexpectedToken {
                        line: line.number,
                        found: Token::Dash.to_string(),
                    }
                    .into());
                }
                (LineKind::Entry { key, .. }, true) => {
                    return Err(FormatError::UnexpectedToken {
                        line: line.number,
                        found: format!("key {}", key),
                    }
                    .into());
                }
            }
        }

        Ok(if is_seq { Node::Seq(items) } else { Node::Map(entries) })
    }

    fn peek(&mut self) -> Result<Option<&Line>> {
        if self.peeked.is_none() {
            self.peeked = self.read_line()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn take(&mut self) -> Result<Option<Line>> {
        match self.peeked.take() {
            Some(line) => Ok(Some(line)),
            None => self.read_line(),
        }
    }

    /// Next non-blank line of input.
    fn read_line(&mut self) -> Result<Option<Line>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let number = self.line;
            let text = std::str::from_utf8(&self.buf)
                .map_err(|_| FormatError::InvalidUtf8 { line: number })?;
            match parse_line(text, number)? {
                Some(line) => return Ok(Some(line)),
                None => self.blank_lines += 1,
            }
        }
    }
}

/// Parses one physical line; `None` for blank and comment-only lines.
fn parse_line(text: &str, number: usize) -> std::result::Result<Option<Line>, FormatError> {
    let mut tokens = Tokenizer::at_line(text, number);
    let indent = match tokens.next().transpose()? {
        None | Some(Token::Newline) => return Ok(None),
        Some(Token::Indent(n)) => n,
        Some(other) => return Err(unexpected(number, &other)),
    };

    let kind = match tokens.next().transpose()? {
        Some(Token::Dash) => LineKind::Item {
            value: trailing_value(&mut tokens, number)?,
        },
        Some(Token::Bare(text)) => match Scalar::parse_bare(text) {
            Some(key) => entry(key, &mut tokens, number)?,
            None => return Err(unexpected(number, &Token::Bare(text))),
        },
        Some(Token::Quoted(text)) => entry(Scalar::Str(text), &mut tokens, number)?,
        Some(other) => return Err(unexpected(number, &other)),
        None => return Ok(None),
    };

    Ok(Some(Line { number, indent, kind }))
}

fn entry(
    key: Scalar,
    tokens: &mut Tokenizer<'_>,
    number: usize,
) -> std::result::Result<LineKind, FormatError> {
    match tokens.next().transpose()? {
        Some(Token::Colon) => {}
        None | Some(Token::Newline) => return Err(FormatError::MissingSeparator { line: number }),
        Some(other) => return Err(unexpected(number, &other)),
    }
    Ok(LineKind::Entry {
        key,
        value: trailing_value(tokens, number)?,
    })
}

/// Optional inline value that must end the line. Bare words outside the
/// dialect (`yes`, `null`, unquoted text) are rejected.
fn trailing_value(
    tokens: &mut Tokenizer<'_>,
    number: usize,
) -> std::result::Result<Option<Node>, FormatError> {
    let node = match tokens.next().transpose()? {
        None | Some(Token::Newline) => return Ok(None),
        Some(Token::Bare(text)) => match Node::from_bare(text) {
            Some(node) => node,
            None => return Err(unexpected(number, &Token::Bare(text))),
        },
        Some(Token::Quoted(text)) => Node::Scalar(Scalar::Str(text)),
        Some(other) => return Err(unexpected(number, &other)),
    };
    match tokens.next().transpose()? {
        None | Some(Token::Newline) => Ok(Some(node)),
        Some(other) => Err(unexpected(number, &other)),
    }
}

fn unexpected(line: usize, token: &Token<'_>) -> FormatError {
    FormatError::UnexpectedToken {
        line,
        found: token.to_string(),
    }
}
