//! Lexical segmentation of store text using nom.
//!
//! The tokenizer knows nothing about keys or values; it only splits text
//! into scalars, separators and line structure:
//!
//! ```text
//! "name": "smol"        Indent(0) Quoted(name) Colon Quoted(smol) Newline
//! "tags":               Indent(0) Quoted(tags) Colon Newline
//!   - 1                 Indent(2) Dash Bare(1) Newline
//!                       Newline
//! ```

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_till1, take_while},
    character::complete::{char, hex_digit1, line_ending, not_line_ending},
    combinator::{eof, map, map_opt, opt, peek, value},
    sequence::{delimited, preceded, terminated},
    IResult,
};

use crate::error::FormatError;

/// A lexical unit of store text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Leading spaces of a non-blank line; always the first token of that line
    Indent(usize),
    /// Unquoted scalar
    Bare(&'a str),
    /// Double-quoted scalar with escapes resolved
    Quoted(String),
    /// Key/value separator
    Colon,
    /// Sequence item marker
    Dash,
    /// End of a line
    Newline,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Indent(n) => write!(f, "indentation of {}", n),
            Token::Bare(text) => write!(f, "'{}'", text),
            Token::Quoted(text) => write!(f, "{:?}", text),
            Token::Colon => write!(f, "':'"),
            Token::Dash => write!(f, "'-'"),
            Token::Newline => write!(f, "line break"),
        }
    }
}

/// Lazy token stream over a piece of text.
///
/// Cloning a tokenizer restarts iteration from the clone point. The stream
/// ends at end of input and after the first error.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    rest: &'a str,
    line: usize,
    line_start: bool,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    /// Tokenizes `text`, numbering lines from 1.
    pub fn new(text: &'a str) -> Self {
        Self::at_line(text, 1)
    }

    /// Tokenizes `text` whose first line is line `line` of a larger input.
    pub fn at_line(text: &'a str, line: usize) -> Self {
        Self {
            rest: text,
            line,
            line_start: true,
            failed: false,
        }
    }

    /// Line the next token starts on.
    pub fn line(&self) -> usize {
        self.line
    }

    fn step(&mut self) -> Option<Result<Token<'a>, FormatError>> {
        if self.line_start {
            return self.line_head();
        }

        // gap matches the empty string, so it cannot fail.
        let (rest, _) = gap(self.rest).unwrap_or((self.rest, ()));
        self.rest = rest;
        if rest.is_empty() {
            return None;
        }
        if let Ok((rest, _)) = line_ending::<_, nom::error::Error<&str>>(rest) {
            self.rest = rest;
            self.line += 1;
            self.line_start = true;
            return Some(Ok(Token::Newline));
        }

        let token = if rest.starts_with('"') {
            match quoted(rest) {
                Ok((rest, text)) => {
                    self.rest = rest;
                    Token::Quoted(text)
                }
                Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                    let line = self.line;
                    let unterminated =
                        e.input.is_empty() || e.input.starts_with('\n') || e.input.starts_with('\r');
                    return Some(Err(if unterminated {
                        FormatError::UnterminatedQuote { line }
                    } else {
                        FormatError::InvalidEscape { line }
                    }));
                }
                Err(nom::Err::Incomplete(_)) => {
                    return Some(Err(FormatError::UnterminatedQuote { line: self.line }))
                }
            }
        } else if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>(':')(rest) {
            self.rest = rest;
            Token::Colon
        } else if let Ok((rest, _)) = dash(rest) {
            self.rest = rest;
            Token::Dash
        } else if let Ok((rest, text)) = bare(rest) {
            self.rest = rest;
            Token::Bare(text)
        } else {
            let found = rest.chars().next().map(String::from).unwrap_or_default();
            return Some(Err(FormatError::UnexpectedToken {
                line: self.line,
                found: format!("{:?}", found),
            }));
        };
        Some(Ok(token))
    }

    /// Handles indentation, blank lines and comment-only lines.
    fn line_head(&mut self) -> Option<Result<Token<'a>, FormatError>> {
        if self.rest.is_empty() {
            return None;
        }
        self.line_start = false;

        let (content, indent) = indentation(self.rest).unwrap_or((self.rest, 0));
        let (after_gap, _) = gap(content).unwrap_or((content, ()));

        if after_gap.is_empty() {
            self.rest = after_gap;
            return None;
        }
        if let Ok((rest, _)) = line_ending::<_, nom::error::Error<&str>>(after_gap) {
            self.rest = rest;
            self.line += 1;
            self.line_start = true;
            return Some(Ok(Token::Newline));
        }
        if content.starts_with('\t') {
            return Some(Err(FormatError::BadIndent { line: self.line }));
        }

        self.rest = content;
        Some(Ok(Token::Indent(indent)))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.step();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

/// Leading spaces, as a count.
fn indentation(input: &str) -> IResult<&str, usize> {
    map(take_while(|c: char| c == ' '), str::len)(input)
}

/// Inline whitespace followed by an optional comment.
fn gap(input: &str) -> IResult<&str, ()> {
    value(
        (),
        terminated(
            take_while(|c: char| c == ' ' || c == '\t'),
            opt(preceded(char('#'), not_line_ending)),
        ),
    )(input)
}

/// `-` standing alone, as opposed to the sign of a bare number.
fn dash(input: &str) -> IResult<&str, char> {
    terminated(
        char('-'),
        peek(alt((tag(" "), tag("\t"), line_ending, eof))),
    )(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace() || matches!(c, ':' | '"' | '#'))(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\"\r\n"),
                '\\',
                escape,
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn escape(input: &str) -> IResult<&str, char> {
    alt((
        value('\\', char('\\')),
        value('"', char('"')),
        value('\n', char('n')),
        value('\r', char('r')),
        value('\t', char('t')),
        value('\0', char('0')),
        unicode,
    ))(input)
}

/// `u{hex}` escape.
fn unicode(input: &str) -> IResult<&str, char> {
    map_opt(
        preceded(char('u'), delimited(char('{'), hex_digit1, char('}'))),
        |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
    )(input)
}
