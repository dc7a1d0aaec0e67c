//! Renders a pushed filter fragment as a parameterized SQL condition.

use crate::spectql::ast::{FilterExpr, Literal, Operator};
use crate::storage::table::{DataType, Schema};

/// A SQL boolean expression with positional `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    pub sql: String,
    pub params: Vec<Literal>,
}

/// Renders `pushed` as `"col" = ? AND "col2" <> ?`, using the schema's
/// spelling of each column. Text columns compare with `COLLATE BINARY`, so a
/// column declared `NOCASE` still matches case-sensitively. Returns `None`
/// for an empty fragment or when a predicate names a column the schema lacks.
pub fn where_clause(pushed: &FilterExpr, schema: &Schema) -> Option<SqlFilter> {
    if pushed.is_empty() {
        return None;
    }

    let mut conditions = Vec::with_capacity(pushed.len());
    let mut params = Vec::with_capacity(pushed.len());

    for predicate in pushed.iter() {
        let column = schema.column(&predicate.column)?;
        let op = match predicate.op {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
        };
        let collate = match column.data_type {
            DataType::String => " COLLATE BINARY",
            _ => "",
        };
        conditions.push(format!(
            "{}{} {} ?",
            quote_identifier(&column.name),
            collate,
            op
        ));
        params.push(predicate.literal.clone());
    }

    Some(SqlFilter {
        sql: conditions.join(" AND "),
        params,
    })
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
