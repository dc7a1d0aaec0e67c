//! Query execution.
//!
//! The interpreter checks the whole query against the resource schema before
//! it opens a scan, so every query-level error surfaces without reading a
//! row. Rows are then pulled one at a time through the residual filter and
//! either projected or folded into aggregate accumulators.

use std::cmp::Ordering;
use std::sync::Arc;

use super::ast::{FilterExpr, Literal, Predicate, Projection, ProjectionItem, Query};
use super::error::{QueryError, Result, SpectqlError};
use super::functions::{Aggregate, Function, FunctionKind, Scalar};
use crate::filter::{translate, DefaultSemantics, OperatorSemantics};
use crate::storage::table::{parse_number, DataType, Row, Schema, Value};
use crate::storage::{RowDecodeWarning, ScanError, TableManager};

/// Ordered query output, prior to serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Source rows dropped because they could not be decoded.
    pub diagnostics: Vec<RowDecodeWarning>,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

}

pub struct Interpreter<'a> {
    manager: &'a TableManager,
    semantics: Arc<dyn OperatorSemantics>,
}

impl<'a> Interpreter<'a> {
    pub fn new(manager: &'a TableManager) -> Self {
        Self::with_semantics(manager, Arc::new(DefaultSemantics))
    }

    pub fn with_semantics(manager: &'a TableManager, semantics: Arc<dyn OperatorSemantics>) -> Self {
        Self { manager, semantics }
    }

    pub fn interpret(&self, query: &Query) -> Result<ResultTable> {
        let resolved = self.manager.resolve(&query.resource)?;
        let schema = resolved.schema.as_ref();

        let plan = Plan::compile(&query.projection, schema)?;
        let filter = query.filter.clone().unwrap_or_default();
        validate_filter(&filter, schema)?;

        let split = translate(&filter, schema, &resolved.source.capabilities());
        let mut scan = self.manager.rows(&resolved, &split.pushed)?;
        let residual = residual_filter(&filter, &split.pushed, scan.unhonored(), schema);
        tracing::debug!(
            "Query {}: pushed [{}], residual [{}]",
            query,
            split.pushed,
            residual
                .iter()
                .map(|(_, p)| p.to_string())
                .collect::<Vec<_>>()
                .join("&")
        );

        let mut output = plan.output();
        let mut diagnostics = Vec::new();

        for item in &mut scan {
            let row = match item {
                Ok(row) => row,
                Err(ScanError::Decode(warning)) => {
                    tracing::warn!("{}: {}", resolved.source.describe(), warning);
                    diagnostics.push(warning);
                    continue;
                }
                Err(ScanError::Source(e)) => return Err(SpectqlError::SourceUnavailable(e)),
            };

            if self.matches(&residual, &row) {
                output.push(&row);
            }
        }

        Ok(ResultTable {
            columns: plan.names,
            rows: output.finish(),
            diagnostics,
        })
    }

    /// Conjunction, left to right, stopping at the first failure.
    fn matches(&self, residual: &[(usize, Predicate)], row: &Row) -> bool {
        residual.iter().all(|(index, predicate)| {
            row.get(*index).is_some_and(|cell| {
                self.semantics
                    .evaluate(predicate.op, cell, &predicate.literal)
            })
        })
    }
}

/// Predicates still to evaluate in memory: everything except what the source
/// actually applied, in query order, bound to column positions.
fn residual_filter(
    filter: &FilterExpr,
    pushed: &FilterExpr,
    unhonored: &FilterExpr,
    schema: &Schema,
) -> Vec<(usize, Predicate)> {
    let mut honored: Vec<&Predicate> = pushed.iter().collect();
    for predicate in unhonored.iter() {
        if let Some(pos) = honored.iter().position(|p| *p == predicate) {
            honored.remove(pos);
        }
    }

    filter
        .iter()
        .filter(|predicate| match honored.iter().position(|p| p == predicate) {
            Some(pos) => {
                honored.remove(pos);
                false
            }
            None => true,
        })
        .filter_map(|p| schema.column_index(&p.column).map(|i| (i, p.clone())))
        .collect()
}

fn validate_filter(filter: &FilterExpr, schema: &Schema) -> Result<()> {
    for predicate in filter.iter() {
        let column = schema
            .column(&predicate.column)
            .ok_or_else(|| QueryError::UnknownColumn(predicate.column.clone()))?;

        let compatible = match (column.data_type, &predicate.literal) {
            (DataType::Integer | DataType::Float, Literal::Number(_)) => true,
            (DataType::Integer | DataType::Float, Literal::String(s)) => parse_number(s).is_some(),
            (DataType::Integer | DataType::Float, Literal::Boolean(_)) => false,
            (DataType::Boolean, Literal::Boolean(_)) => true,
            (DataType::Boolean, _) => false,
            (DataType::String | DataType::Null, _) => true,
        };

        if !compatible {
            return Err(QueryError::TypeMismatch {
                column: column.name.clone(),
                message: format!(
                    "cannot compare a {} column with {} literal {}",
                    column.data_type,
                    predicate.literal.kind(),
                    predicate.literal
                ),
            }
            .into());
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Column(usize),
    Scalar(Scalar, usize),
    Aggregate(Aggregate, usize, DataType),
}

/// Compiled projection: one step and one output name per output column.
#[derive(Debug)]
struct Plan {
    steps: Vec<Step>,
    names: Vec<String>,
    aggregate: bool,
}

impl Plan {
    fn compile(projection: &Projection, schema: &Schema) -> Result<Self> {
        let items = match projection {
            Projection::Wildcard => {
                return Ok(Plan {
                    steps: (0..schema.column_count()).map(Step::Column).collect(),
                    names: schema.columns.iter().map(|c| c.name.clone()).collect(),
                    aggregate: false,
                })
            }
            Projection::Items(items) => items,
        };

        let mut steps = Vec::with_capacity(items.len());
        let mut names = Vec::with_capacity(items.len());

        for item in items {
            let (step, name) = match item {
                ProjectionItem::Column(name) => {
                    (Step::Column(column_index(schema, name)?), name.clone())
                }
                ProjectionItem::Call { function, column } => {
                    let function = Function::lookup(function)
                        .ok_or_else(|| QueryError::UnknownFunction(function.clone()))?;
                    let index = column_index(schema, column)?;
                    let data_type = schema.columns[index].data_type;
                    check_argument(function, &schema.columns[index].name, data_type)?;

                    let step = match function.kind() {
                        FunctionKind::Aggregate(aggregate) => {
                            Step::Aggregate(aggregate, index, data_type)
                        }
                        FunctionKind::Scalar(scalar) => Step::Scalar(scalar, index),
                    };
                    (step, function.output_name(column))
                }
            };

            steps.push(step);
            names.push(name);
        }

        let first_aggregate = items
            .iter()
            .zip(&steps)
            .find(|(_, s)| matches!(s, Step::Aggregate(..)));
        let first_other = items
            .iter()
            .zip(&steps)
            .find(|(_, s)| !matches!(s, Step::Aggregate(..)));

        if let (Some((aggregate, _)), Some((other, _))) = (first_aggregate, first_other) {
            return Err(QueryError::MixedProjection {
                aggregate: aggregate.to_string(),
                other: other.to_string(),
            }
            .into());
        }

        Ok(Plan {
            aggregate: first_aggregate.is_some(),
            steps,
            names,
        })
    }

    fn output(&self) -> Output {
        if self.aggregate {
            Output::Aggregate(
                self.steps
                    .iter()
                    .filter_map(|step| match step {
                        Step::Aggregate(f, index, data_type) => {
                            Some((*index, Accumulator::new(*f, *data_type)))
                        }
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            Output::Rows {
                steps: self.steps.clone(),
                rows: Vec::new(),
            }
        }
    }
}

fn column_index(schema: &Schema, name: &str) -> Result<usize> {
    schema
        .column_index(name)
        .ok_or_else(|| QueryError::UnknownColumn(name.to_string()).into())
}

fn check_argument(function: Function, column: &str, data_type: DataType) -> Result<()> {
    let accepted = match function {
        Function::Ucase | Function::Lcase | Function::Len => {
            matches!(data_type, DataType::String | DataType::Null)
        }
        Function::Sum | Function::Avg => data_type != DataType::Boolean,
        Function::Count | Function::Min | Function::Max => true,
    };

    if accepted {
        Ok(())
    } else {
        Err(QueryError::TypeMismatch {
            column: column.to_string(),
            message: format!("{} does not apply to a {} column", function, data_type),
        }
        .into())
    }
}

enum Output {
    Rows { steps: Vec<Step>, rows: Vec<Row> },
    Aggregate(Vec<(usize, Accumulator)>),
}

impl Output {
    fn push(&mut self, row: &Row) {
        match self {
            Output::Rows { steps, rows } => {
                let values = steps
                    .iter()
                    .map(|step| match step {
                        Step::Column(i) => row.get(*i).cloned().unwrap_or(Value::Null),
                        Step::Scalar(f, i) => {
                            row.get(*i).map(|v| f.apply(v)).unwrap_or(Value::Null)
                        }
                        Step::Aggregate(..) => Value::Null,
                    })
                    .collect();
                rows.push(Row::new(values));
            }
            Output::Aggregate(accumulators) => {
                for (index, acc) in accumulators.iter_mut() {
                    acc.update(row.get(*index).unwrap_or(&Value::Null));
                }
            }
        }
    }

    fn finish(self) -> Vec<Row> {
        match self {
            Output::Rows { rows, .. } => rows,
            Output::Aggregate(accumulators) => vec![Row::new(
                accumulators
                    .into_iter()
                    .map(|(_, acc)| acc.finish())
                    .collect(),
            )],
        }
    }
}

enum Accumulator {
    Count(i64),
    Sum(f64),
    Avg { sum: f64, count: i64 },
    Extreme(Extreme),
}

impl Accumulator {
    fn new(aggregate: Aggregate, data_type: DataType) -> Self {
        match aggregate {
            Aggregate::Count => Accumulator::Count(0),
            Aggregate::Sum => Accumulator::Sum(0.0),
            Aggregate::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            Aggregate::Min => Accumulator::Extreme(Extreme::new(Ordering::Less, data_type)),
            Aggregate::Max => Accumulator::Extreme(Extreme::new(Ordering::Greater, data_type)),
        }
    }

    fn update(&mut self, value: &Value) {
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(sum) => {
                if let Some(n) = value.as_number() {
                    *sum += n;
                }
            }
            Accumulator::Avg { sum, count } => {
                if let Some(n) = value.as_number() {
                    *sum += n;
                    *count += 1;
                }
            }
            Accumulator::Extreme(extreme) => extreme.update(value),
        }
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Integer(n),
            Accumulator::Sum(sum) => Value::Float(sum),
            Accumulator::Avg { sum, count } if count > 0 => Value::Float(sum / count as f64),
            Accumulator::Avg { .. } => Value::Null,
            Accumulator::Extreme(extreme) => extreme.finish(),
        }
    }
}

/// Running min or max. `keep` is the ordering a new value must have against
/// the current best to replace it.
///
/// Text columns are tracked both ways: numerically while every value parses
/// as a number, lexicographically as the fallback. A numeric winner keeps its
/// source text so `"33"` comes out as an integer and `"32.58"` as a float.
struct Extreme {
    keep: Ordering,
    data_type: DataType,
    best: Option<Value>,
    best_number: Option<(f64, String)>,
    best_text: Option<String>,
    all_numeric: bool,
}

impl Extreme {
    fn new(keep: Ordering, data_type: DataType) -> Self {
        Self {
            keep,
            data_type,
            best: None,
            best_number: None,
            best_text: None,
            all_numeric: true,
        }
    }

    fn update(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }

        match self.data_type {
            DataType::String | DataType::Null => {
                let text = value.to_string();
                match value.as_number() {
                    Some(n) => {
                        let replace = match &self.best_number {
                            None => true,
                            Some((best, _)) => n.partial_cmp(best) == Some(self.keep),
                        };
                        if replace {
                            self.best_number = Some((n, text.clone()));
                        }
                    }
                    None => self.all_numeric = false,
                }
                if self.best_text.as_ref().map_or(true, |b| text.cmp(b) == self.keep) {
                    self.best_text = Some(text);
                }
            }
            _ => {
                let replace = match &self.best {
                    None => true,
                    Some(best) => value.partial_cmp(best) == Some(self.keep),
                };
                if replace {
                    self.best = Some(value.clone());
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self.data_type {
            DataType::String | DataType::Null => {
                if self.all_numeric {
                    match self.best_number {
                        Some((n, text)) => match text.trim().parse::<i64>() {
                            Ok(i) => Value::Integer(i),
                            Err(_) => Value::Float(n),
                        },
                        None => Value::Null,
                    }
                } else {
                    self.best_text.map(Value::String).unwrap_or(Value::Null)
                }
            }
            _ => self.best.unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PushdownCapabilities;
    use crate::spectql::ast::{Operator, ResourcePath};
    use crate::spectql::error::ErrorKind;
    use crate::spectql::parser::parse_query;
    use crate::storage::source::{Scan, TableSource};
    use crate::storage::table::{Column, Table};
    use crate::storage::{Catalog, MemorySource, StorageError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

    fn text(s: &str) -> Value {
        Value::String(s.to_string())
    }

    fn districts() -> Table {
        let schema = Schema::new(vec![
            Column::new("name", DataType::String),
            Column::new("province", DataType::String),
            Column::new("population", DataType::Integer),
            Column::new("lat", DataType::Float),
            Column::new("capital", DataType::Boolean),
        ]);
        let rows = [
            ("Tirin Kot", "Uruzgan", 72000, 32.7, true),
            ("Chora", "Uruzgan", 51000, 32.58, false),
            ("Farah", "Farah", 50000, 32.37, true),
            ("Qala-e-Kah", "Farah", 30000, 32.4, false),
            ("Paghman", "Kabul", 90000, 34.41, false),
        ]
        .into_iter()
        .map(|(name, province, population, lat, capital)| {
            Row::new(vec![
                text(name),
                text(province),
                Value::Integer(population),
                Value::Float(lat),
                Value::Boolean(capital),
            ])
        })
        .collect();
        Table::with_rows("districts", schema, rows)
    }

    fn manager_with(source: Arc<dyn TableSource>) -> TableManager {
        let mut catalog = Catalog::new();
        catalog
            .register(&ResourcePath::from_path("test/districts"), source)
            .unwrap();
        TableManager::new(catalog)
    }

    fn memory_manager(capabilities: PushdownCapabilities) -> TableManager {
        manager_with(Arc::new(
            MemorySource::new(districts()).with_capabilities(capabilities),
        ))
    }

    fn run(manager: &TableManager, query: &str) -> Result<ResultTable> {
        Interpreter::new(manager).interpret(&parse_query(query)?)
    }

    fn column(result: &ResultTable, index: usize) -> Vec<Value> {
        result.rows.iter().map(|r| r.values[index].clone()).collect()
    }

    /// Source replaying a fixed item list, counting scans and flagging when
    /// the row iterator is dropped.
    #[derive(Debug)]
    struct ScriptedSource {
        schema: Schema,
        script: fn() -> Vec<std::result::Result<Row, ScanError>>,
        scans: AtomicUsize,
        released: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        fn new(script: fn() -> Vec<std::result::Result<Row, ScanError>>) -> Self {
            Self {
                schema: Schema::new(vec![
                    Column::new("name", DataType::String),
                    Column::new("lat", DataType::String),
                ]),
                script,
                scans: AtomicUsize::new(0),
                released: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    struct ReleaseGuard(Arc<AtomicBool>);

    impl Drop for ReleaseGuard {
        fn drop(&mut self) {
            self.0.store(true, AtomicOrdering::SeqCst);
        }
    }

    struct GuardedRows {
        items: std::vec::IntoIter<std::result::Result<Row, ScanError>>,
        _guard: ReleaseGuard,
    }

    impl Iterator for GuardedRows {
        type Item = std::result::Result<Row, ScanError>;

        fn next(&mut self) -> Option<Self::Item> {
            self.items.next()
        }
    }

    impl TableSource for ScriptedSource {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        fn schema(&self) -> crate::storage::error::Result<Schema> {
            Ok(self.schema.clone())
        }

        fn scan(&self, _schema: &Schema, pushed: &FilterExpr) -> crate::storage::error::Result<Scan> {
            self.scans.fetch_add(1, AtomicOrdering::SeqCst);
            let rows = GuardedRows {
                items: (self.script)().into_iter(),
                _guard: ReleaseGuard(Arc::clone(&self.released)),
            };
            Ok(Scan::new(Box::new(rows), pushed.clone()))
        }
    }

    fn clean_rows() -> Vec<std::result::Result<Row, ScanError>> {
        vec![
            Ok(Row::new(vec![text("a"), text("1.5")])),
            Ok(Row::new(vec![text("b"), text("2.5")])),
        ]
    }

    fn rows_with_bad_record() -> Vec<std::result::Result<Row, ScanError>> {
        vec![
            Ok(Row::new(vec![text("a"), text("1.5")])),
            Err(RowDecodeWarning::new(3, "expected 2 fields, found 1").into()),
            Ok(Row::new(vec![text("b"), text("2.5")])),
        ]
    }

    fn rows_with_failure() -> Vec<std::result::Result<Row, ScanError>> {
        vec![
            Ok(Row::new(vec![text("a"), text("1.5")])),
            Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")).into()),
            Ok(Row::new(vec![text("b"), text("2.5")])),
        ]
    }

    #[test]
    fn test_wildcard_keeps_schema_order() {
        let manager = memory_manager(PushdownCapabilities::none());
        let result = run(&manager, "test/districts{*}").unwrap();

        assert_eq!(
            result.columns,
            vec!["name", "province", "population", "lat", "capital"]
        );
        assert_eq!(result.row_count(), 5);
        assert_eq!(result.rows[0].values[0], text("Tirin Kot"));
    }

    #[test]
    fn test_projection_names_and_order() {
        let manager = memory_manager(PushdownCapabilities::none());
        let result = run(
            &manager,
            "test/districts{LAT,ucase(name),len(province)}?province=='Farah'",
        )
        .unwrap();

        assert_eq!(
            result.columns,
            vec!["LAT", "uppercase_name", "length_province"]
        );
        assert_eq!(
            result.rows[1].values,
            vec![Value::Float(32.4), text("QALA-E-KAH"), Value::Integer(5)]
        );
    }

    #[test]
    fn test_aggregates() {
        let manager = memory_manager(PushdownCapabilities::none());
        let result = run(
            &manager,
            "test/districts{count(name),sum(population),avg(lat),min(population),max(name)}?province!='Kabul'",
        )
        .unwrap();

        assert_eq!(
            result.columns,
            vec![
                "count_name",
                "sum_population",
                "avg_lat",
                "min_population",
                "max_name"
            ]
        );
        assert_eq!(result.row_count(), 1);
        let values = &result.rows[0].values;
        assert_eq!(values[0], Value::Integer(4));
        assert_eq!(values[1], Value::Float(203000.0));
        let avg = values[2].as_float().unwrap();
        assert!((avg - 32.5125).abs() < 1e-9);
        assert_eq!(values[3], Value::Integer(30000));
        assert_eq!(values[4], text("Tirin Kot"));
    }

    #[test]
    fn test_boolean_min_max() {
        let manager = memory_manager(PushdownCapabilities::none());
        let result = run(&manager, "test/districts{min(capital),max(capital)}").unwrap();

        assert_eq!(
            result.rows[0].values,
            vec![Value::Boolean(false), Value::Boolean(true)]
        );
    }

    #[test]
    fn test_text_min_max_numeric_when_all_numeric() {
        let manager = manager_with(Arc::new(ScriptedSource::new(|| {
            vec![
                Ok(Row::new(vec![text("a"), text("9")])),
                Ok(Row::new(vec![text("b"), text("10")])),
            ]
        })));
        let result = run(&manager, "test/districts{max(lat),max(name)}").unwrap();

        assert_eq!(result.rows[0].values, vec![Value::Integer(10), text("b")]);
    }

    #[test]
    fn test_text_extremes_keep_source_number_form() {
        let manager = manager_with(Arc::new(ScriptedSource::new(|| {
            vec![
                Ok(Row::new(vec![text("a"), text("33")])),
                Ok(Row::new(vec![text("b"), text("32.58")])),
                Ok(Row::new(vec![text("c"), text("32.7")])),
            ]
        })));
        let result = run(&manager, "test/districts{max(lat),min(lat)}").unwrap();

        assert_eq!(
            result.rows[0].values,
            vec![Value::Integer(33), Value::Float(32.58)]
        );
    }

    #[test]
    fn test_count_includes_null_cells() {
        let manager = manager_with(Arc::new(ScriptedSource::new(|| {
            vec![
                Ok(Row::new(vec![text("a"), text("1.5")])),
                Ok(Row::new(vec![text("b"), Value::Null])),
                Ok(Row::new(vec![text("c"), Value::Null])),
            ]
        })));
        let result = run(&manager, "test/districts{count(lat),sum(lat),avg(lat)}").unwrap();

        assert_eq!(
            result.rows[0].values,
            vec![Value::Integer(3), Value::Float(1.5), Value::Float(1.5)]
        );
    }

    #[test]
    fn test_empty_aggregates() {
        let manager = memory_manager(PushdownCapabilities::none());
        let result = run(
            &manager,
            "test/districts{count(lat),sum(lat),avg(lat),min(lat),max(lat)}?province=='Helmand'",
        )
        .unwrap();

        assert_eq!(result.row_count(), 1);
        assert_eq!(
            result.rows[0].values,
            vec![
                Value::Integer(0),
                Value::Float(0.0),
                Value::Null,
                Value::Null,
                Value::Null
            ]
        );
    }

    #[test]
    fn test_errors_detected_before_scan() {
        let source = Arc::new(ScriptedSource::new(clean_rows));
        let manager = manager_with(source.clone());

        let cases = [
            ("test/districts{count(lat),name}", ErrorKind::MixedProjection),
            ("test/districts{avg(lat),ucase(name)}", ErrorKind::MixedProjection),
            ("test/districts{nosuchfn(lat)}", ErrorKind::UnknownFunction),
            ("test/districts{elevation}", ErrorKind::UnknownColumn),
            ("test/districts{*}?elevation=='1'", ErrorKind::UnknownColumn),
        ];
        for (query, kind) in cases {
            let err = run(&manager, query).unwrap_err();
            assert_eq!(err.kind(), kind, "{}", query);
        }

        assert_eq!(source.scans.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_type_mismatches() {
        let manager = memory_manager(PushdownCapabilities::none());

        for query in [
            "test/districts{ucase(population)}",
            "test/districts{len(capital)}",
            "test/districts{sum(capital)}",
            "test/districts{avg(capital)}",
            "test/districts{*}?population=='many'",
            "test/districts{*}?lat==true",
            "test/districts{*}?capital=='yes'",
            "test/districts{*}?capital==1",
        ] {
            let err = run(&manager, query).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TypeMismatch, "{}", query);
        }

        assert!(run(&manager, "test/districts{*}?population=='50000'").is_ok());
    }

    #[test]
    fn test_unknown_resource() {
        let manager = memory_manager(PushdownCapabilities::none());
        let err = run(&manager, "test/provinces{*}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }

    #[test]
    fn test_partial_pushdown_matches_in_memory_evaluation() {
        let queries = [
            "test/districts{name}?province=='Uruzgan'&population>51000",
            "test/districts{name}?capital!=true&lat<32.5",
            "test/districts{count(name)}?province!='Farah'&population==51000",
            "test/districts{name,lat}?name>'D'&province=='Farah'",
        ];
        let plain = memory_manager(PushdownCapabilities::none());
        let pushing = memory_manager(PushdownCapabilities::equality_on(&[
            DataType::String,
            DataType::Integer,
            DataType::Boolean,
        ]));

        for query in queries {
            assert_eq!(
                run(&plain, query).unwrap(),
                run(&pushing, query).unwrap(),
                "{}",
                query
            );
        }
    }

    #[test]
    fn test_idempotent() {
        let manager = memory_manager(PushdownCapabilities::none());
        let query = "test/districts{name,lat}?lat>32.4";
        assert_eq!(run(&manager, query).unwrap(), run(&manager, query).unwrap());
    }

    #[test]
    fn test_decode_warnings_are_collected() {
        let manager = manager_with(Arc::new(ScriptedSource::new(rows_with_bad_record)));
        let result = run(&manager, "test/districts{sum(lat)}").unwrap();

        assert_eq!(result.rows[0].values, vec![Value::Float(4.0)]);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].row, 3);
    }

    #[test]
    fn test_source_failure_aborts_and_releases() {
        let source = Arc::new(ScriptedSource::new(rows_with_failure));
        let manager = manager_with(source.clone());

        let err = run(&manager, "test/districts{*}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(source.released.load(AtomicOrdering::SeqCst));
    }

    #[test]
    fn test_scan_released_after_success() {
        let source = Arc::new(ScriptedSource::new(clean_rows));
        let manager = manager_with(source.clone());

        run(&manager, "test/districts{name}").unwrap();
        assert_eq!(source.scans.load(AtomicOrdering::SeqCst), 1);
        assert!(source.released.load(AtomicOrdering::SeqCst));
    }

    #[derive(Debug)]
    struct StrictOrdering;

    impl OperatorSemantics for StrictOrdering {
        fn evaluate(&self, op: Operator, cell: &Value, literal: &Literal) -> bool {
            match (op, cell.as_number(), literal) {
                (Operator::Gt, Some(a), Literal::Number(b)) => a > *b,
                (Operator::Lt, Some(a), Literal::Number(b)) => a < *b,
                _ => DefaultSemantics.evaluate(op, cell, literal),
            }
        }
    }

    #[test]
    fn test_pluggable_semantics() {
        let manager = memory_manager(PushdownCapabilities::none());
        let query = parse_query("test/districts{name}?population>51000").unwrap();

        let inclusive = Interpreter::new(&manager).interpret(&query).unwrap();
        let strict = Interpreter::with_semantics(&manager, Arc::new(StrictOrdering))
            .interpret(&query)
            .unwrap();

        assert_eq!(
            column(&inclusive, 0),
            vec![text("Tirin Kot"), text("Chora"), text("Paghman")]
        );
        assert_eq!(column(&strict, 0), vec![text("Tirin Kot"), text("Paghman")]);
    }
}
