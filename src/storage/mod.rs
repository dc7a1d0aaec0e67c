pub mod catalog;
pub mod csv;
pub mod error;
pub mod manager;
pub mod memory;
pub mod parquet;
pub mod source;
pub mod spreadsheet;
pub mod sqlite;
pub mod table;

pub use catalog::{Catalog, CatalogError};
pub use csv::CsvSource;
pub use error::{RowDecodeWarning, ScanError, StorageError};
pub use manager::{Resolved, TableManager};
pub use memory::MemorySource;
pub use parquet::ParquetSource;
pub use source::{Scan, TableSource};
pub use spreadsheet::SpreadsheetSource;
pub use sqlite::SqliteSource;
pub use table::{Column, DataType, Row, Schema, Table, Value};
