use std::sync::Arc;

use super::error::{Result, ScanError};
use super::source::{Scan, TableSource};
use super::table::{Row, Schema, Table};
use crate::filter::{DefaultSemantics, OperatorSemantics, PushdownCapabilities};
use crate::spectql::ast::{FilterExpr, Predicate};

/// Rows held in memory. Pushed predicates the configured capabilities cover
/// are applied during the scan; the rest are handed back.
#[derive(Debug, Clone)]
pub struct MemorySource {
    table: Arc<Table>,
    capabilities: PushdownCapabilities,
}

impl MemorySource {
    pub fn new(table: Table) -> Self {
        Self {
            table: Arc::new(table),
            capabilities: PushdownCapabilities::none(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: PushdownCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

impl TableSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory:{}", self.table.name)
    }

    fn schema(&self) -> Result<Schema> {
        Ok(self.table.schema.clone())
    }

    fn capabilities(&self) -> PushdownCapabilities {
        self.capabilities.clone()
    }

    fn scan(&self, schema: &Schema, pushed: &FilterExpr) -> Result<Scan> {
        let (honored, unhonored): (Vec<Predicate>, Vec<Predicate>) =
            pushed.iter().cloned().partition(|p| {
                schema
                    .column(&p.column)
                    .is_some_and(|c| self.capabilities.supports(c.data_type, p.op))
            });

        let honored: Vec<(usize, Predicate)> = honored
            .into_iter()
            .filter_map(|p| schema.column_index(&p.column).map(|i| (i, p)))
            .collect();

        let rows = MemoryRows {
            table: Arc::clone(&self.table),
            honored,
            next: 0,
        };

        Ok(Scan::new(Box::new(rows), FilterExpr::new(unhonored)))
    }
}

struct MemoryRows {
    table: Arc<Table>,
    honored: Vec<(usize, Predicate)>,
    next: usize,
}

impl Iterator for MemoryRows {
    type Item = std::result::Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(row) = self.table.rows.get(self.next) {
            self.next += 1;
            let keep = self.honored.iter().all(|(index, p)| {
                row.get(*index)
                    .is_some_and(|cell| DefaultSemantics.evaluate(p.op, cell, &p.literal))
            });
            if keep {
                return Some(Ok(row.clone()));
            }
        }
        None
    }
}
