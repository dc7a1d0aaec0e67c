//! Projection function table.
//!
//! New functions are added as rows here; the grammar accepts any function
//! name and the interpreter rejects names missing from this table.

use crate::storage::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Avg,
    Sum,
    Count,
    Min,
    Max,
    Ucase,
    Lcase,
    Len,
}

impl Function {
    pub fn lookup(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "avg" => Some(Self::Avg),
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "ucase" => Some(Self::Ucase),
            "lcase" => Some(Self::Lcase),
            "len" => Some(Self::Len),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Ucase => "ucase",
            Self::Lcase => "lcase",
            Self::Len => "len",
        }
    }

    /// Splits the function by how it is evaluated.
    pub fn kind(&self) -> FunctionKind {
        match self {
            Self::Avg => FunctionKind::Aggregate(Aggregate::Avg),
            Self::Sum => FunctionKind::Aggregate(Aggregate::Sum),
            Self::Count => FunctionKind::Aggregate(Aggregate::Count),
            Self::Min => FunctionKind::Aggregate(Aggregate::Min),
            Self::Max => FunctionKind::Aggregate(Aggregate::Max),
            Self::Ucase => FunctionKind::Scalar(Scalar::Ucase),
            Self::Lcase => FunctionKind::Scalar(Scalar::Lcase),
            Self::Len => FunctionKind::Scalar(Scalar::Len),
        }
    }

    /// Output field name for `self(column)`.
    pub fn output_name(&self, column: &str) -> String {
        let prefix = match self {
            Self::Ucase => "uppercase",
            Self::Lcase => "lowercase",
            Self::Len => "length",
            aggregate => aggregate.name(),
        };
        format!("{}_{}", prefix, column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar(Scalar),
    Aggregate(Aggregate),
}

/// Per-row functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Ucase,
    Lcase,
    Len,
}

impl Scalar {
    /// Applies the function to one cell. Null passes through.
    pub fn apply(&self, value: &Value) -> Value {
        let text = match value {
            Value::Null => return Value::Null,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self {
            Self::Ucase => Value::String(text.to_uppercase()),
            Self::Lcase => Value::String(text.to_lowercase()),
            Self::Len => Value::Integer(text.chars().count() as i64),
        }
    }
}

/// Functions folding every surviving row into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Avg,
    Sum,
    Count,
    Min,
    Max,
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
