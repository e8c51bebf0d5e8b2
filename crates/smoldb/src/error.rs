//! Error types for smoldb

use std::fmt::Display;
use std::io;

use thiserror::Error;

/// Result type alias for smoldb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem open/read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing file is not valid store text
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A value could not be converted to the file's value model
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Key not found
    #[error("key not found")]
    NotFound,
}

impl Error {
    /// Whether this is the ordinary "key absent" outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Malformed store text. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A quoted scalar runs into the end of its line
    #[error("line {line}: unterminated quoted string")]
    UnterminatedQuote {
        /// Offending line
        line: usize,
    },

    /// Unknown or malformed `\` escape inside a quoted scalar
    #[error("line {line}: invalid escape sequence")]
    InvalidEscape {
        /// Offending line
        line: usize,
    },

    /// A key is not followed by `:`
    #[error("line {line}: missing ':' after key")]
    MissingSeparator {
        /// Offending line
        line: usize,
    },

    /// A token that the grammar does not allow at this position
    #[error("line {line}: unexpected {found}")]
    UnexpectedToken {
        /// Offending line
        line: usize,
        /// Rendering of the token
        found: String,
    },

    /// Indentation that does not match any open block, or a tab in indentation
    #[error("line {line}: bad indentation")]
    BadIndent {
        /// Offending line
        line: usize,
    },

    /// The line is not valid UTF-8
    #[error("line {line}: invalid UTF-8")]
    InvalidUtf8 {
        /// Offending line
        line: usize,
    },

    /// Well-formed text that does not fit the requested key or value type
    #[error("line {line}: {message}")]
    TypeMismatch {
        /// Line of the top-level entry holding the value
        line: usize,
        /// What did not fit
        message: String,
    },
}

impl FormatError {
    /// Line the error was reported on.
    pub fn line(&self) -> usize {
        match self {
            FormatError::UnterminatedQuote { line }
            | FormatError::InvalidEscape { line }
            | FormatError::MissingSeparator { line }
            | FormatError::UnexpectedToken { line, .. }
            | FormatError::BadIndent { line }
            | FormatError::InvalidUtf8 { line }
            | FormatError::TypeMismatch { line, .. } => *line,
        }
    }
}

/// Failure converting between a Rust value and a [`Node`](crate::Node).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValueError(String);

impl ValueError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl serde::ser::Error for ValueError {
    fn custom<T: Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

impl serde::de::Error for ValueError {
    fn custom<T: Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}
