pub mod cli;
pub mod filter;
pub mod spectql;
pub mod storage;

pub use spectql::{convert, execute, parse_query, Interpreter, Query, Record, ResultTable, SpectqlError};
pub use storage::table::{Column, DataType, Schema, Table, Value};
pub use storage::{Catalog, TableManager};
