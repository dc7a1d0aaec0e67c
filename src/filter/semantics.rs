//! Operator evaluation.
//!
//! Every comparison the interpreter makes goes through [`OperatorSemantics`],
//! so the meaning of an operator can be swapped without touching the grammar,
//! the AST, or pushdown.
//!
//! The ordering operators have no settled meaning yet. The only observed use
//! is `Unit_Type>'District'` keeping rows whose `Unit_Type` is exactly
//! `District`, which rules out a strict ordering. Until that is resolved,
//! [`DefaultSemantics`] reads them inclusively: `>` keeps cells that are not
//! below the literal and `<` keeps cells that are not above it.

use std::cmp::Ordering;
use std::fmt::Debug;

use crate::spectql::ast::{Literal, Operator};
use crate::storage::table::{parse_number, Value};

pub trait OperatorSemantics: Debug + Send + Sync {
    /// Whether `cell op literal` holds.
    fn evaluate(&self, op: Operator, cell: &Value, literal: &Literal) -> bool;
}

/// Case-sensitive equality, numeric comparison where both sides are numeric,
/// inclusive ordering. A null cell never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSemantics;

impl OperatorSemantics for DefaultSemantics {
    fn evaluate(&self, op: Operator, cell: &Value, literal: &Literal) -> bool {
        if cell.is_null() {
            return false;
        }

        match op {
            Operator::Eq => equals(cell, literal),
            Operator::NotEq => !equals(cell, literal),
            Operator::Gt => matches!(compare(cell, literal), Some(Ordering::Greater | Ordering::Equal)),
            Operator::Lt => matches!(compare(cell, literal), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

fn equals(cell: &Value, literal: &Literal) -> bool {
    match (cell, literal) {
        (Value::String(s), Literal::String(l)) => s == l,
        (Value::Boolean(b), Literal::Boolean(l)) => b == l,
        (Value::String(s), Literal::Boolean(l)) => s.trim().eq_ignore_ascii_case(&l.to_string()),
        (_, Literal::Number(n)) => cell.as_number().is_some_and(|v| v == *n),
        (Value::Integer(_) | Value::Float(_), Literal::String(l)) => {
            match (cell.as_float(), parse_number(l)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

fn compare(cell: &Value, literal: &Literal) -> Option<Ordering> {
    if let (Value::Boolean(a), Literal::Boolean(b)) = (cell, literal) {
        return Some(a.cmp(b));
    }

    let literal_number = match literal {
        Literal::Number(n) => Some(*n),
        Literal::String(s) => parse_number(s),
        Literal::Boolean(_) => None,
    };
    if let (Some(a), Some(b)) = (cell.as_number(), literal_number) {
        return a.partial_cmp(&b);
    }

    let cell_text = match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let literal_text = match literal {
        Literal::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(cell_text.cmp(&literal_text))
}
