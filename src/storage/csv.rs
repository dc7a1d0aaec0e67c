use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;

use super::error::{Result, RowDecodeWarning, ScanError, StorageError};
use super::source::{Scan, TableSource};
use super::table::{Column, DataType, Row, Schema, Value};
use crate::spectql::ast::FilterExpr;

/// Delimiter-separated text file. Every column is declared as text; the
/// file carries no type information.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: char,
    has_header: bool,
    start_row: usize,
    aliases: HashMap<String, String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: ',',
            has_header: true,
            start_row: 1,
            aliases: HashMap::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// 1-based line at which the header (or the data, without a header)
    /// starts. Lines before it are skipped.
    pub fn with_start_row(mut self, start_row: usize) -> Self {
        self.start_row = start_row.max(1);
        self
    }

    /// Renames columns: header name (or generated `columnN`) to output name.
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    fn open(&self) -> Result<CsvLines<BufReader<File>>> {
        let file = File::open(&self.path)?;
        let mut lines = CsvLines::new(BufReader::new(file));
        lines.skip(self.start_row - 1)?;
        Ok(lines)
    }

    fn column_names(&self, first_line: &str) -> Result<Vec<String>> {
        let first_line = first_line.trim_start_matches('\u{feff}');
        let fields = parse_line(first_line, self.delimiter).map_err(|message| {
            StorageError::MalformedHeader {
                source_name: self.describe(),
                message,
            }
        })?;

        let names = fields
            .into_iter()
            .enumerate()
            .map(|(i, field)| {
                let name = if self.has_header && !field.is_empty() {
                    field
                } else {
                    format!("column{}", i + 1)
                };
                self.aliases.get(&name).cloned().unwrap_or(name)
            })
            .collect();

        Ok(names)
    }
}

impl TableSource for CsvSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn schema(&self) -> Result<Schema> {
        let mut lines = self.open()?;
        let first_line = lines
            .next_non_blank()?
            .ok_or_else(|| StorageError::EmptySource(self.describe()))?;

        let columns = self
            .column_names(&first_line)?
            .into_iter()
            .map(|name| Column::new(name, DataType::String))
            .collect();

        Ok(Schema::new(columns))
    }

    fn scan(&self, schema: &Schema, pushed: &FilterExpr) -> Result<Scan> {
        let mut lines = self.open()?;
        if self.has_header {
            lines.next_non_blank()?;
        }

        let rows = CsvRows {
            lines,
            delimiter: self.delimiter,
            width: schema.column_count(),
        };

        // Plain files evaluate nothing themselves.
        Ok(Scan::new(Box::new(rows), pushed.clone()))
    }
}

/// Line reader that tracks the 1-based number of the last line read.
struct CsvLines<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> CsvLines<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            match self.lines.next() {
                Some(line) => {
                    line?;
                    self.line_number += 1;
                }
                None => break,
            }
        }
        Ok(())
    }

    fn next_line(&mut self) -> Option<std::io::Result<String>> {
        let line = self.lines.next()?;
        self.line_number += 1;
        Some(line)
    }

    fn next_non_blank(&mut self) -> Result<Option<String>> {
        while let Some(line) = self.next_line() {
            let line = line?;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

struct CsvRows<R> {
    lines: CsvLines<R>,
    delimiter: char,
    width: usize,
}

impl<R: BufRead> CsvRows<R> {
    fn decode(&self, line: &str) -> std::result::Result<Row, ScanError> {
        let row_number = self.lines.line_number;
        let fields = parse_line(line, self.delimiter)
            .map_err(|message| RowDecodeWarning::new(row_number, message))?;

        if fields.len() != self.width {
            return Err(RowDecodeWarning::new(
                row_number,
                format!("expected {} fields, found {}", self.width, fields.len()),
            )
            .into());
        }

        let values = fields
            .into_iter()
            .map(|field| {
                if field.is_empty() {
                    Value::Null
                } else {
                    Value::String(field)
                }
            })
            .collect();

        Ok(Row::new(values))
    }
}

impl<R: BufRead> Iterator for CsvRows<R> {
    type Item = std::result::Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next_line()? {
                Ok(line) => line,
                Err(e) => return Some(Err(StorageError::from(e).into())),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.decode(&line));
        }
    }
}

/// Splits one line on `delimiter`, honoring double quotes and `""` escapes.
/// Unquoted fields are trimmed.
pub fn parse_line(line: &str, delimiter: char) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                // Check for escaped quote
                if chars.peek() == Some(&'"') {
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current_field.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(current_field.trim().to_string());
            current_field = String::new();
        } else {
            current_field.push(c);
        }
    }

    if in_quotes {
        return Err("Unclosed quote".to_string());
    }

    fields.push(current_field.trim().to_string());
    Ok(fields)
}
