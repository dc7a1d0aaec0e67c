//! Filter generators: splitting a query filter between the backing source
//! and the interpreter.
//!
//! [`translate`] works on whole predicates. A predicate goes to the source
//! only when the source declares it can evaluate that operator on that column
//! type; everything else stays in the in-memory residual. Both halves keep the
//! original predicate order, and because the filter is a pure conjunction the
//! split never changes which rows survive.

pub mod semantics;
pub mod sql;

use std::collections::HashSet;

use crate::spectql::ast::{FilterExpr, Literal, Operator, Predicate};
use crate::storage::table::{DataType, Schema};

pub use semantics::{DefaultSemantics, OperatorSemantics};
pub use sql::{where_clause, SqlFilter};

/// `(column type, operator)` pairs a source evaluates natively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushdownCapabilities {
    supported: HashSet<(DataType, Operator)>,
}

impl PushdownCapabilities {
    /// No pushdown: the interpreter evaluates the whole filter.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, data_type: DataType, op: Operator) -> Self {
        self.supported.insert((data_type, op));
        self
    }

    /// `==` and `!=` on every given type.
    pub fn equality_on(types: &[DataType]) -> Self {
        types.iter().fold(Self::none(), |caps, t| {
            caps.with(*t, Operator::Eq).with(*t, Operator::NotEq)
        })
    }

    pub fn supports(&self, data_type: DataType, op: Operator) -> bool {
        self.supported.contains(&(data_type, op))
    }

    pub fn is_empty(&self) -> bool {
        self.supported.is_empty()
    }
}

/// Result of [`translate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSplit {
    pub pushed: FilterExpr,
    pub residual: FilterExpr,
}

/// Splits `filter` into the fragment `capabilities` allows pushing and the
/// residual left for in-memory evaluation.
pub fn translate(
    filter: &FilterExpr,
    schema: &Schema,
    capabilities: &PushdownCapabilities,
) -> FilterSplit {
    if capabilities.is_empty() {
        return FilterSplit {
            pushed: FilterExpr::empty(),
            residual: filter.clone(),
        };
    }

    let (pushed, residual): (Vec<Predicate>, Vec<Predicate>) = filter
        .iter()
        .cloned()
        .partition(|p| is_pushable(p, schema, capabilities));

    FilterSplit {
        pushed: FilterExpr::new(pushed),
        residual: FilterExpr::new(residual),
    }
}

fn is_pushable(predicate: &Predicate, schema: &Schema, capabilities: &PushdownCapabilities) -> bool {
    let column = match schema.column(&predicate.column) {
        Some(c) => c,
        None => return false,
    };

    predicate.op.is_settled()
        && capabilities.supports(column.data_type, predicate.op)
        && literal_fits(column.data_type, &predicate.literal)
}

/// Whether a backend compares `literal` against a `data_type` column the
/// same way the interpreter does, without any coercion.
fn literal_fits(data_type: DataType, literal: &Literal) -> bool {
    matches!(
        (data_type, literal),
        (DataType::String, Literal::String(_))
            | (DataType::Integer, Literal::Number(_))
            | (DataType::Float, Literal::Number(_))
            | (DataType::Boolean, Literal::Boolean(_))
    )
}
