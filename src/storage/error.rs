use std::fmt;

use thiserror::Error;

/// A resource that cannot be resolved, opened or read. Always fatal to the
/// query that hit it.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Empty source: {0}")]
    EmptySource(String),

    #[error("Malformed header in {source_name}: {message}")]
    MalformedHeader { source_name: String, message: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedColumn { column: String, data_type: String },
}

/// A source row that could not be decoded against the declared schema. The
/// row is dropped and the scan goes on.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDecodeWarning {
    /// 1-based record number within the source.
    pub row: usize,
    pub message: String,
}

impl RowDecodeWarning {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowDecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} dropped: {}", self.row, self.message)
    }
}

/// One failed step of a row scan.
#[derive(Debug)]
pub enum ScanError {
    /// Non-fatal: skip the row.
    Decode(RowDecodeWarning),
    /// Fatal: abort the scan.
    Source(StorageError),
}

impl From<RowDecodeWarning> for ScanError {
    fn from(warning: RowDecodeWarning) -> Self {
        ScanError::Decode(warning)
    }
}

impl From<StorageError> for ScanError {
    fn from(error: StorageError) -> Self {
        ScanError::Source(error)
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
