use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, ToSql};

use super::error::{Result, RowDecodeWarning, ScanError, StorageError};
use super::source::{Scan, TableSource};
use super::table::{Column, DataType, Row, Schema, Value};
use crate::filter::{sql::quote_identifier, where_clause, PushdownCapabilities};
use crate::spectql::ast::{FilterExpr, Literal, Predicate};

const DEFAULT_BATCH_SIZE: i64 = 512;

/// One table of a SQLite database file, read in `rowid` order.
///
/// Equality on numeric columns and on TEXT-affinity columns is evaluated by
/// SQLite; anything else comes back unhonored. Rows are fetched in batches
/// keyed on `rowid`, so tables declared `WITHOUT ROWID` cannot be scanned.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    db_path: PathBuf,
    table_name: String,
    batch_size: i64,
}

impl SqliteSource {
    pub fn new(db_path: impl Into<PathBuf>, table_name: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            table_name: table_name.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1) as i64;
        self
    }

    fn connect(&self) -> Result<Connection> {
        // Read-only: a missing file is an error, never a new empty database.
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    /// `(name, declared type)` per column, in table order.
    fn table_info(&self, conn: &Connection) -> Result<Vec<(String, String)>> {
        let mut stmt = conn.prepare(&format!(
            "PRAGMA table_info({})",
            quote_identifier(&self.table_name)
        ))?;

        let columns = stmt
            .query_map([], |row| Ok((row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<Vec<(String, String)>, _>>()?;

        if columns.is_empty() {
            return Err(StorageError::TableNotFound(self.describe()));
        }
        Ok(columns)
    }

    fn select_sql(&self, schema: &Schema, filter_sql: Option<&str>) -> String {
        let columns: Vec<String> = schema
            .columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect();

        let mut sql = format!(
            "SELECT rowid, {} FROM {} WHERE rowid > ?",
            columns.join(", "),
            quote_identifier(&self.table_name)
        );
        if let Some(filter_sql) = filter_sql {
            sql.push_str(" AND ");
            sql.push_str(filter_sql);
        }
        sql.push_str(" ORDER BY rowid LIMIT ?");
        sql
    }
}

/// SQLite's affinity rules: `INT` wins, then any of `CHAR`, `CLOB`, `TEXT`.
fn has_text_affinity(type_name: &str) -> bool {
    let t = type_name.to_uppercase();
    !t.contains("INT") && (t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT"))
}

/// Whether SQLite compares the cells of `predicate`'s column the way the
/// interpreter compares their decoded values.
fn compares_natively(
    predicate: &Predicate,
    schema: &Schema,
    declared: &HashMap<String, String>,
) -> bool {
    let column = match schema.column(&predicate.column) {
        Some(c) => c,
        None => return false,
    };
    match (column.data_type, declared.get(&column.name)) {
        (DataType::Integer | DataType::Float, Some(_)) => true,
        (DataType::String, Some(type_name)) => has_text_affinity(type_name),
        _ => false,
    }
}

fn declared_type(type_name: &str) -> DataType {
    match type_name.to_uppercase().as_str() {
        t if t.contains("INT") => DataType::Integer,
        t if t.contains("REAL") || t.contains("FLOAT") || t.contains("DOUBLE") => DataType::Float,
        t if t.contains("BOOL") => DataType::Boolean,
        _ => DataType::String,
    }
}

impl TableSource for SqliteSource {
    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.db_path.display(), self.table_name)
    }

    fn schema(&self) -> Result<Schema> {
        let conn = self.connect()?;
        let columns = self
            .table_info(&conn)?
            .into_iter()
            .map(|(name, type_name)| Column::new(name, declared_type(&type_name)))
            .collect();

        Ok(Schema::new(columns))
    }

    // Booleans stay residual: decoding reads 'true' and 2 as true, SQL does not.
    fn capabilities(&self) -> PushdownCapabilities {
        PushdownCapabilities::equality_on(&[DataType::String, DataType::Integer, DataType::Float])
    }

    fn scan(&self, schema: &Schema, pushed: &FilterExpr) -> Result<Scan> {
        let conn = self.connect()?;

        let declared: HashMap<String, String> = self.table_info(&conn)?.into_iter().collect();
        let (native, unhonored): (Vec<Predicate>, Vec<Predicate>) = pushed
            .iter()
            .cloned()
            .partition(|p| compares_natively(p, schema, &declared));

        let (filter, unhonored) = match where_clause(&FilterExpr::new(native), schema) {
            Some(filter) => (Some(filter), FilterExpr::new(unhonored)),
            None => (None, pushed.clone()),
        };
        let sql = self.select_sql(schema, filter.as_ref().map(|f| f.sql.as_str()));
        // Fail on a bad statement now rather than on the first row.
        conn.prepare_cached(&sql)?;

        let rows = SqliteRows {
            conn,
            sql,
            params: filter.map(|f| f.params).unwrap_or_default(),
            types: schema.columns.iter().map(|c| c.data_type).collect(),
            batch_size: self.batch_size,
            last_rowid: i64::MIN,
            buffer: VecDeque::new(),
            exhausted: false,
        };

        Ok(Scan::new(Box::new(rows), unhonored))
    }
}

impl ToSql for Literal {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Literal::String(s) => s.to_sql(),
            Literal::Number(n) => n.to_sql(),
            Literal::Boolean(b) => b.to_sql(),
        }
    }
}

/// Batched row reader. Owns the connection; dropping it closes the database.
struct SqliteRows {
    conn: Connection,
    sql: String,
    params: Vec<Literal>,
    types: Vec<DataType>,
    batch_size: i64,
    last_rowid: i64,
    buffer: VecDeque<std::result::Result<Row, ScanError>>,
    exhausted: bool,
}

impl SqliteRows {
    fn fetch_batch(&mut self) -> std::result::Result<(), StorageError> {
        let mut batch = Vec::new();
        let mut last_rowid = self.last_rowid;

        {
            let mut stmt = self.conn.prepare_cached(&self.sql)?;
            let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(self.params.len() + 2);
            bound.push(&self.last_rowid);
            for param in &self.params {
                bound.push(param);
            }
            bound.push(&self.batch_size);

            let mut rows = stmt.query(bound.as_slice())?;
            while let Some(row) = rows.next()? {
                let rowid: i64 = row.get(0)?;
                last_rowid = rowid;
                batch.push(decode_row(row, &self.types, rowid));
            }
        }

        if (batch.len() as i64) < self.batch_size {
            self.exhausted = true;
        }
        self.last_rowid = last_rowid;
        self.buffer.extend(batch);
        Ok(())
    }
}

impl Iterator for SqliteRows {
    type Item = std::result::Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_batch() {
                self.exhausted = true;
                return Some(Err(e.into()));
            }
        }
        self.buffer.pop_front()
    }
}

fn decode_row(
    row: &rusqlite::Row<'_>,
    types: &[DataType],
    rowid: i64,
) -> std::result::Result<Row, ScanError> {
    let row_number = usize::try_from(rowid).unwrap_or(0);
    let mut values = Vec::with_capacity(types.len());

    for (i, data_type) in types.iter().enumerate() {
        let cell = row.get_ref(i + 1).map_err(StorageError::from)?;
        let value = decode_cell(cell, *data_type)
            .map_err(|message| RowDecodeWarning::new(row_number, message))?;
        values.push(value);
    }

    Ok(Row::new(values))
}

fn decode_cell(cell: ValueRef<'_>, data_type: DataType) -> std::result::Result<Value, String> {
    let value = match (cell, data_type) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), DataType::Boolean) => Value::Boolean(i != 0),
        (ValueRef::Integer(i), DataType::Float) => Value::Float(i as f64),
        (ValueRef::Integer(i), DataType::String) => Value::String(i.to_string()),
        (ValueRef::Integer(i), _) => Value::Integer(i),
        (ValueRef::Real(f), DataType::String) => Value::String(f.to_string()),
        (ValueRef::Real(f), _) => Value::Float(f),
        (ValueRef::Text(bytes), data_type) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| format!("invalid UTF-8 text: {}", e))?;
            match data_type {
                DataType::Integer => text
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| format!("'{}' is not an integer", text))?,
                DataType::Float => text
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| format!("'{}' is not a number", text))?,
                DataType::Boolean => match text.trim().to_lowercase().as_str() {
                    "true" | "1" => Value::Boolean(true),
                    "false" | "0" => Value::Boolean(false),
                    _ => return Err(format!("'{}' is not a boolean", text)),
                },
                _ => Value::String(text.to_string()),
            }
        }
        (ValueRef::Blob(_), _) => return Err("binary cells are not supported".to_string()),
    };
    Ok(value)
}
