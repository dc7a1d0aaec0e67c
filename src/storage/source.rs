//! Backend abstraction for tabular resources.

use std::fmt::Debug;

use super::error::{Result, ScanError};
use super::table::{Row, Schema};
use crate::filter::PushdownCapabilities;
use crate::spectql::ast::FilterExpr;

/// Lazy, single-pass row sequence owned by a scan.
pub type RowIter = Box<dyn Iterator<Item = std::result::Result<Row, ScanError>> + Send>;

/// A tabular backend: a CSV file, a SQLite table, a Parquet file, or rows in
/// memory.
pub trait TableSource: Debug + Send + Sync {
    /// Short human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Ordered columns with declared types.
    fn schema(&self) -> Result<Schema>;

    /// Predicates this source evaluates itself. Defaults to none.
    fn capabilities(&self) -> PushdownCapabilities {
        PushdownCapabilities::none()
    }

    /// Opens a row scan. `pushed` holds predicates the caller asks the source
    /// to apply; any the source does not apply come back in
    /// [`Scan::unhonored`].
    fn scan(&self, schema: &Schema, pushed: &FilterExpr) -> Result<Scan>;
}

/// An open row scan.
///
/// The scan owns its file handle or connection. Dropping it, whether the
/// rows were exhausted, a row failed, or the caller stopped early, releases
/// the handle.
pub struct Scan {
    rows: RowIter,
    unhonored: FilterExpr,
}

impl Scan {
    pub fn new(rows: RowIter, unhonored: FilterExpr) -> Self {
        Self { rows, unhonored }
    }

    /// Predicates of the pushed fragment the source did not apply.
    pub fn unhonored(&self) -> &FilterExpr {
        &self.unhonored
    }
}

impl Iterator for Scan {
    type Item = std::result::Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl Debug for Scan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scan")
            .field("unhonored", &self.unhonored)
            .finish_non_exhaustive()
    }
}
