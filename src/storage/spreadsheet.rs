use std::collections::HashMap;
use std::path::PathBuf;

use calamine::{open_workbook_auto, Data, DataType as _, Range, Reader};
use chrono::Timelike;

use super::error::{Result, RowDecodeWarning, ScanError, StorageError};
use super::source::{Scan, TableSource};
use super::table::{Column, DataType, Row, Schema, Value};
use crate::spectql::ast::FilterExpr;

/// One sheet of an `.xls`/`.xlsx`/`.ods` workbook. Like CSV, every column is
/// declared as text.
///
/// `start_row` counts spreadsheet rows from 1, whatever the sheet's used
/// range. Rows without a single filled cell are skipped.
#[derive(Debug, Clone)]
pub struct SpreadsheetSource {
    path: PathBuf,
    sheet: Option<String>,
    has_header: bool,
    start_row: usize,
    aliases: HashMap<String, String>,
}

impl SpreadsheetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
            has_header: true,
            start_row: 1,
            aliases: HashMap::new(),
        }
    }

    /// Sheet to read. Defaults to the first sheet of the workbook.
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_start_row(mut self, start_row: usize) -> Self {
        self.start_row = start_row.max(1);
        self
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    fn open(&self) -> Result<SheetCursor> {
        let mut workbook = open_workbook_auto(&self.path)?;
        let names = workbook.sheet_names();
        let sheet = match &self.sheet {
            Some(sheet) if names.contains(sheet) => sheet.clone(),
            Some(_) => return Err(StorageError::TableNotFound(self.describe())),
            None => names
                .first()
                .cloned()
                .ok_or_else(|| StorageError::EmptySource(self.describe()))?,
        };

        let range = workbook.worksheet_range(&sheet)?;
        let (first_row, first_col) = range.start().unwrap_or((0, 0));
        let skip = (self.start_row - 1).saturating_sub(first_row as usize);

        Ok(SheetCursor {
            range,
            next: skip,
            first_row: first_row as usize,
            first_col: first_col as usize,
        })
    }

    fn column_names(&self, cursor: &SheetCursor, header: Option<&[Data]>) -> Vec<String> {
        (0..cursor.range.width())
            .map(|i| {
                let cell = header
                    .and_then(|cells| cells.get(i))
                    .map(cell_text)
                    .unwrap_or_default();
                let name = if cell.trim().is_empty() {
                    format!("column{}", cursor.first_col + i + 1)
                } else {
                    cell.trim().to_string()
                };
                self.aliases.get(&name).cloned().unwrap_or(name)
            })
            .collect()
    }

    fn describe_sheet(&self) -> String {
        match &self.sheet {
            Some(sheet) => format!("{}#{}", self.path.display(), sheet),
            None => self.path.display().to_string(),
        }
    }
}

impl TableSource for SpreadsheetSource {
    fn describe(&self) -> String {
        format!("spreadsheet:{}", self.describe_sheet())
    }

    fn schema(&self) -> Result<Schema> {
        let mut cursor = self.open()?;
        let first = cursor
            .next_filled()
            .ok_or_else(|| StorageError::EmptySource(self.describe()))?;

        let header = if self.has_header {
            cursor.cells(first)
        } else {
            None
        };
        let columns = self
            .column_names(&cursor, header.as_deref())
            .into_iter()
            .map(|name| Column::new(name, DataType::String))
            .collect();

        Ok(Schema::new(columns))
    }

    fn scan(&self, schema: &Schema, pushed: &FilterExpr) -> Result<Scan> {
        let mut cursor = self.open()?;
        if self.has_header {
            cursor.next_filled();
        }

        let rows = SheetRows {
            cursor,
            width: schema.column_count(),
        };

        Ok(Scan::new(Box::new(rows), pushed.clone()))
    }
}

/// Walks the used range of a sheet by relative row index.
struct SheetCursor {
    range: Range<Data>,
    next: usize,
    first_row: usize,
    first_col: usize,
}

impl SheetCursor {
    /// Relative index of the next row holding at least one filled cell.
    fn next_filled(&mut self) -> Option<usize> {
        while self.next < self.range.height() {
            let row = self.next;
            self.next += 1;
            let filled = (0..self.range.width())
                .any(|col| !matches!(self.range.get((row, col)), None | Some(Data::Empty)));
            if filled {
                return Some(row);
            }
        }
        None
    }

    fn cells(&self, row: usize) -> Option<Vec<Data>> {
        (row < self.range.height()).then(|| {
            (0..self.range.width())
                .map(|col| self.range.get((row, col)).cloned().unwrap_or(Data::Empty))
                .collect()
        })
    }

    /// 1-based spreadsheet row number of a relative row index.
    fn row_number(&self, row: usize) -> usize {
        self.first_row + row + 1
    }
}

struct SheetRows {
    cursor: SheetCursor,
    width: usize,
}

impl Iterator for SheetRows {
    type Item = std::result::Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.cursor.next_filled()?;
        let row_number = self.cursor.row_number(row);
        let cells = self.cursor.cells(row)?;

        let values = cells
            .iter()
            .take(self.width)
            .map(|cell| decode_cell(cell).map_err(|message| RowDecodeWarning::new(row_number, message)))
            .collect::<std::result::Result<Vec<_>, _>>();

        Some(values.map(Row::new).map_err(ScanError::from))
    }
}

fn decode_cell(cell: &Data) -> std::result::Result<Value, String> {
    match cell {
        Data::Empty => Ok(Value::Null),
        Data::Error(e) => Err(format!("cell error {:?}", e)),
        other => {
            let text = cell_text(other);
            if text.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::String(text))
            }
        }
    }
}

/// Text form of a cell. Whole floats drop their fraction (`33`, not `33.0`);
/// dates read as `%Y-%m-%d`, with the time only when it is not midnight.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => match other.as_datetime() {
            Some(dt) if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 => {
                dt.format("%Y-%m-%d").to_string()
            }
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => other.to_string(),
        },
    }
}
