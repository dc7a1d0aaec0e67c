//! Failure taxonomy of a query.
//!
//! Every variant of [`SpectqlError`] aborts the whole query. Malformed source
//! rows are not errors; they travel as
//! [`RowDecodeWarning`](crate::storage::RowDecodeWarning) diagnostics.

use std::fmt;

use thiserror::Error;

use super::lexer::TokenKind;
use crate::storage::StorageError;

/// A character that starts no token, or an unterminated token.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at position {position}")]
pub struct SyntaxError {
    pub position: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// A token sequence that does not match the grammar.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unexpected token: expected {expected}, found {token} at position {position}")]
pub struct ParseError {
    pub token: TokenKind,
    pub position: usize,
    pub expected: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Aggregate {aggregate} cannot be combined with non-aggregate {other} in one projection")]
    MixedProjection { aggregate: String, other: String },

    #[error("Type mismatch on column {column}: {message}")]
    TypeMismatch { column: String, message: String },
}

#[derive(Error, Debug)]
pub enum SpectqlError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] StorageError),
}

/// Machine-readable failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    ParseError,
    UnknownFunction,
    UnknownColumn,
    MixedProjection,
    TypeMismatch,
    SourceUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "syntax_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::UnknownFunction => "unknown_function",
            ErrorKind::UnknownColumn => "unknown_column",
            ErrorKind::MixedProjection => "mixed_projection",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::SourceUnavailable => "source_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SpectqlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpectqlError::Syntax(_) => ErrorKind::SyntaxError,
            SpectqlError::Parse(_) => ErrorKind::ParseError,
            SpectqlError::Query(QueryError::UnknownFunction(_)) => ErrorKind::UnknownFunction,
            SpectqlError::Query(QueryError::UnknownColumn(_)) => ErrorKind::UnknownColumn,
            SpectqlError::Query(QueryError::MixedProjection { .. }) => ErrorKind::MixedProjection,
            SpectqlError::Query(QueryError::TypeMismatch { .. }) => ErrorKind::TypeMismatch,
            SpectqlError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
        }
    }

    /// Character offset into the query text, for lexical and grammar errors.
    pub fn position(&self) -> Option<usize> {
        match self {
            SpectqlError::Syntax(e) => Some(e.position),
            SpectqlError::Parse(e) => Some(e.position),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpectqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_position() {
        let err: SpectqlError = SyntaxError::new(4, "Unexpected character '#'").into();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert_eq!(err.position(), Some(4));

        let err: SpectqlError = QueryError::UnknownFunction("nosuchfn".to_string()).into();
        assert_eq!(err.kind().as_str(), "unknown_function");
        assert_eq!(err.position(), None);
        assert_eq!(err.to_string(), "Query error: Unknown function: nosuchfn");
    }
}
