//! Error types for CIF tokenizing, parsing and validation.
//!
//! ## Error Categories
//!
//! - **Lex errors**: unterminated quoted strings or text fields, invalid
//!   characters, push-back overflow. Always fatal, carry a line number.
//! - **Syntax errors**: unexpected tokens, inconsistent loop categories,
//!   save frames where they are not allowed. Always fatal, carry a line number.
//! - **Validation errors**: a value that does not satisfy its dictionary
//!   definition. Fatal only when the validator runs in strict mode.
//! - **Schema errors**: a dictionary that contradicts itself (unknown parent
//!   category in a link, mismatched key lists, bad type expression). Always fatal.
//!
//! ## Examples
//!
//! ```rust
//! use cif_sac::{parse_str, Error};
//!
//! let result = parse_str("data_x\n_a.b 'unterminated\n");
//! match result {
//!     Err(Error::Lex { line, .. }) => assert_eq!(line, 2),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use std::fmt;
use thiserror::Error;

/// A single validation diagnostic, naming the category and (optionally) the
/// item it concerns.
///
/// # Examples
///
/// ```rust
/// use cif_sac::ValidationError;
///
/// let err = ValidationError::new("atom_site", Some("id"), "value '?x' is not allowed");
/// assert_eq!(
///     err.to_string(),
///     "When validating _atom_site.id: value '?x' is not allowed"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub category: String,
    pub item: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: &str, item: Option<&str>, message: impl Into<String>) -> Self {
        ValidationError {
            category: category.to_string(),
            item: item.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item {
            Some(item) => write!(
                f,
                "When validating _{}.{}: {}",
                self.category, item, self.message
            ),
            None => write!(f, "When validating _{}: {}", self.category, self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Represents all errors produced by this crate.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error while reading the underlying stream
    #[error("IO error: {0}")]
    Io(String),

    /// Lexical error; the document cannot be tokenized past this point
    #[error("Lex error at line {line}: {msg}")]
    Lex { line: usize, msg: String },

    /// Grammar violation
    #[error("Syntax error at line {line}: {msg}")]
    Syntax { line: usize, msg: String },

    /// The parser needed one token and the tokenizer produced another
    #[error("Syntax error at line {line}: unexpected token, expected {expected} but found {found}")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },

    /// A value failed its dictionary definition
    #[error("{0}")]
    Validation(ValidationError),

    /// The dictionary itself is inconsistent
    #[error("Schema error: {0}")]
    Schema(String),

    /// The model builder rejected an event
    #[error("Model error: {0}")]
    Model(String),
}

impl Error {
    /// Creates a lex error at the given line.
    ///
    /// ```rust
    /// use cif_sac::Error;
    ///
    /// let err = Error::lex(12, "unterminated textfield");
    /// assert!(err.to_string().contains("line 12"));
    /// ```
    pub fn lex(line: usize, msg: &str) -> Self {
        Error::Lex {
            line,
            msg: msg.to_string(),
        }
    }

    /// Creates a syntax error at the given line.
    pub fn syntax(line: usize, msg: &str) -> Self {
        Error::Syntax {
            line,
            msg: msg.to_string(),
        }
    }

    /// Creates an expected-vs-found token error.
    pub fn unexpected_token(line: usize, expected: &str, found: &str) -> Self {
        Error::UnexpectedToken {
            line,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a schema error. Schema errors ignore validator strictness.
    pub fn schema<T: fmt::Display>(msg: T) -> Self {
        Error::Schema(msg.to_string())
    }

    /// Creates a model builder error.
    pub fn model<T: fmt::Display>(msg: T) -> Self {
        Error::Model(msg.to_string())
    }

    /// Creates an I/O error for stream failures.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// The line number for lex and syntax errors.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Lex { line, .. }
            | Error::Syntax { line, .. }
            | Error::UnexpectedToken { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_without_item() {
        let err = ValidationError::new("entity", None, "category is missing");
        assert_eq!(err.to_string(), "When validating _entity: category is missing");
    }

    #[test]
    fn test_line_accessor() {
        assert_eq!(Error::syntax(4, "oops").line(), Some(4));
        assert_eq!(Error::unexpected_token(9, "Value", "Tag").line(), Some(9));
        assert_eq!(Error::schema("bad").line(), None);
    }
}
