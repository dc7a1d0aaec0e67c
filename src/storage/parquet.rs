use std::collections::VecDeque;
use std::fs::File;
use std::path::PathBuf;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Date64Array, Decimal128Array, Float32Array,
    Float64Array,
    Int16Array, Int32Array, Int64Array, Int8Array, LargeStringArray, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{DataType as ArrowDataType, TimeUnit};
use arrow::compute::cast;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, Utc};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use super::error::{Result, RowDecodeWarning, ScanError, StorageError};
use super::source::{Scan, TableSource};
use super::table::{Column, DataType, Row, Schema, Value};
use crate::spectql::ast::FilterExpr;

const BATCH_SIZE: usize = 1024;

/// A Parquet file, decoded one record batch at a time.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    path: PathBuf,
}

impl ParquetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn builder(&self) -> Result<ParquetRecordBatchReaderBuilder<File>> {
        let file = File::open(&self.path)?;
        Ok(ParquetRecordBatchReaderBuilder::try_new(file)?)
    }
}

impl TableSource for ParquetSource {
    fn describe(&self) -> String {
        format!("parquet:{}", self.path.display())
    }

    fn schema(&self) -> Result<Schema> {
        let builder = self.builder()?;
        convert_schema(builder.schema())
    }

    fn scan(&self, _schema: &Schema, pushed: &FilterExpr) -> Result<Scan> {
        let reader = self.builder()?.with_batch_size(BATCH_SIZE).build()?;

        let rows = ParquetRows {
            reader,
            pending: VecDeque::new(),
            rows_read: 0,
        };

        Ok(Scan::new(Box::new(rows), pushed.clone()))
    }
}

struct ParquetRows {
    reader: ParquetRecordBatchReader,
    pending: VecDeque<std::result::Result<Row, ScanError>>,
    rows_read: usize,
}

impl ParquetRows {
    fn decode_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let columns = batch
            .columns()
            .iter()
            .map(decode_dictionary)
            .collect::<Result<Vec<_>>>()?;

        for row_idx in 0..batch.num_rows() {
            self.rows_read += 1;
            let row_number = self.rows_read;

            let row: std::result::Result<Row, ScanError> = columns
                .iter()
                .map(|array| convert_array_value(array, row_idx))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Row::new)
                .map_err(|message| RowDecodeWarning::new(row_number, message).into());
            self.pending.push_back(row);
        }
        Ok(())
    }
}

/// Dictionary-encoded columns are unpacked to their value type.
fn decode_dictionary(array: &ArrayRef) -> Result<ArrayRef> {
    match array.data_type() {
        ArrowDataType::Dictionary(_, value_type) => Ok(cast(array, value_type)?),
        _ => Ok(array.clone()),
    }
}

impl Iterator for ParquetRows {
    type Item = std::result::Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.is_empty() {
            match self.reader.next()? {
                Ok(batch) => {
                    if let Err(e) = self.decode_batch(&batch) {
                        return Some(Err(e.into()));
                    }
                }
                Err(e) => return Some(Err(StorageError::from(e).into())),
            }
        }
        self.pending.pop_front()
    }
}

/// Maps the file schema, failing on the first column type rows could not be
/// decoded from.
pub fn convert_schema(arrow_schema: &arrow::datatypes::Schema) -> Result<Schema> {
    let columns = arrow_schema
        .fields()
        .iter()
        .map(|field| {
            convert_data_type(field.data_type())
                .map(|data_type| Column::new(field.name().clone(), data_type))
                .ok_or_else(|| StorageError::UnsupportedColumn {
                    column: field.name().clone(),
                    data_type: field.data_type().to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Schema::new(columns))
}

fn convert_data_type(arrow_type: &ArrowDataType) -> Option<DataType> {
    let data_type = match arrow_type {
        ArrowDataType::Int8
        | ArrowDataType::Int16
        | ArrowDataType::Int32
        | ArrowDataType::Int64
        | ArrowDataType::UInt8
        | ArrowDataType::UInt16
        | ArrowDataType::UInt32
        | ArrowDataType::UInt64 => DataType::Integer,
        ArrowDataType::Float32 | ArrowDataType::Float64 => DataType::Float,
        ArrowDataType::Boolean => DataType::Boolean,
        ArrowDataType::Null => DataType::Null,
        // Decimals, dates and timestamps are rendered as text.
        ArrowDataType::Utf8
        | ArrowDataType::LargeUtf8
        | ArrowDataType::Decimal128(_, _)
        | ArrowDataType::Date32
        | ArrowDataType::Date64
        | ArrowDataType::Timestamp(_, _) => DataType::String,
        ArrowDataType::Dictionary(_, value_type) => return convert_data_type(value_type),
        _ => return None,
    };
    Some(data_type)
}

fn downcast<T: 'static>(array: &ArrayRef) -> std::result::Result<&T, String> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| format!("unexpected array layout for {}", array.data_type()))
}

fn convert_array_value(array: &ArrayRef, index: usize) -> std::result::Result<Value, String> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        ArrowDataType::Int8 => Value::Integer(downcast::<Int8Array>(array)?.value(index) as i64),
        ArrowDataType::Int16 => Value::Integer(downcast::<Int16Array>(array)?.value(index) as i64),
        ArrowDataType::Int32 => Value::Integer(downcast::<Int32Array>(array)?.value(index) as i64),
        ArrowDataType::Int64 => Value::Integer(downcast::<Int64Array>(array)?.value(index)),
        ArrowDataType::UInt8 => Value::Integer(downcast::<UInt8Array>(array)?.value(index) as i64),
        ArrowDataType::UInt16 => {
            Value::Integer(downcast::<UInt16Array>(array)?.value(index) as i64)
        }
        ArrowDataType::UInt32 => {
            Value::Integer(downcast::<UInt32Array>(array)?.value(index) as i64)
        }
        ArrowDataType::UInt64 => {
            let v = downcast::<UInt64Array>(array)?.value(index);
            Value::Integer(i64::try_from(v).map_err(|_| format!("{} overflows a 64-bit integer", v))?)
        }
        ArrowDataType::Float32 => Value::Float(downcast::<Float32Array>(array)?.value(index) as f64),
        ArrowDataType::Float64 => Value::Float(downcast::<Float64Array>(array)?.value(index)),
        ArrowDataType::Boolean => Value::Boolean(downcast::<BooleanArray>(array)?.value(index)),
        ArrowDataType::Utf8 => {
            Value::String(downcast::<StringArray>(array)?.value(index).to_string())
        }
        ArrowDataType::LargeUtf8 => {
            Value::String(downcast::<LargeStringArray>(array)?.value(index).to_string())
        }
        ArrowDataType::Decimal128(_, _) => {
            Value::String(downcast::<Decimal128Array>(array)?.value_as_string(index))
        }
        ArrowDataType::Date32 => {
            let days = downcast::<Date32Array>(array)?.value(index);
            let date = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| {
                    epoch.checked_add_signed(chrono::Duration::days(days as i64))
                })
                .ok_or_else(|| format!("date out of range: {} days", days))?;
            Value::String(date.format("%Y-%m-%d").to_string())
        }
        ArrowDataType::Date64 => {
            let millis = downcast::<Date64Array>(array)?.value(index);
            let datetime = DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| format!("date out of range: {} ms", millis))?;
            Value::String(datetime.format("%Y-%m-%d").to_string())
        }
        ArrowDataType::Timestamp(unit, _) => Value::String(format_timestamp(array, *unit, index)?),
        ArrowDataType::Null => Value::Null,
        other => return Err(format!("unsupported column type {}", other)),
    };

    Ok(value)
}

fn format_timestamp(
    array: &ArrayRef,
    unit: TimeUnit,
    index: usize,
) -> std::result::Result<String, String> {
    let (datetime, pattern) = match unit {
        TimeUnit::Second => {
            let seconds = downcast::<TimestampSecondArray>(array)?.value(index);
            (DateTime::<Utc>::from_timestamp(seconds, 0), "%Y-%m-%d %H:%M:%S")
        }
        TimeUnit::Millisecond => {
            let millis = downcast::<TimestampMillisecondArray>(array)?.value(index);
            (
                DateTime::<Utc>::from_timestamp_millis(millis),
                "%Y-%m-%d %H:%M:%S%.3f",
            )
        }
        TimeUnit::Microsecond => {
            let micros = downcast::<TimestampMicrosecondArray>(array)?.value(index);
            (
                DateTime::<Utc>::from_timestamp_micros(micros),
                "%Y-%m-%d %H:%M:%S%.6f",
            )
        }
        TimeUnit::Nanosecond => {
            let nanos = downcast::<TimestampNanosecondArray>(array)?.value(index);
            (
                Some(DateTime::<Utc>::from_timestamp_nanos(nanos)),
                "%Y-%m-%d %H:%M:%S%.9f",
            )
        }
    };

    datetime
        .map(|dt| dt.format(pattern).to_string())
        .ok_or_else(|| "timestamp out of range".to_string())
}
