//! Query representation built by the parser.
//!
//! `Display` on every node prints canonical SPECTQL text, so a parsed query
//! can be re-printed and parsed again into an equal tree.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub resource: ResourcePath,
    pub projection: Projection,
    pub filter: Option<FilterExpr>,
    /// Output format tag, passed through untouched.
    pub format: Option<String>,
}

impl Query {
    /// Filter predicates, empty when the query has no `?` clause.
    pub fn predicates(&self) -> &[Predicate] {
        self.filter
            .as_ref()
            .map(|f| f.predicates.as_slice())
            .unwrap_or(&[])
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.resource, self.projection)?;
        if let Some(filter) = &self.filter {
            if !filter.is_empty() {
                write!(f, "?{}", filter)?;
            }
        }
        if let Some(format) = &self.format {
            write!(f, ":{}", format)?;
        }
        Ok(())
    }
}

/// Slash-separated resource name, at least collection + resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    pub segments: Vec<String>,
}

impl ResourcePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses `a/b/c`, ignoring leading and trailing slashes.
    pub fn from_path(path: &str) -> Self {
        Self::new(path.split('/').filter(|s| !s.is_empty()))
    }

    /// Catalog key, e.g. `tabular/geo`.
    pub fn key(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `{*}`: every schema column in schema order.
    Wildcard,
    Items(Vec<ProjectionItem>),
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Wildcard => f.write_str("{*}"),
            Projection::Items(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "{{{}}}", parts.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionItem {
    Column(String),
    /// `fn(column)`; the function name is resolved by the interpreter.
    Call { function: String, column: String },
}

impl ProjectionItem {
    pub fn column(&self) -> &str {
        match self {
            ProjectionItem::Column(name) => name,
            ProjectionItem::Call { column, .. } => column,
        }
    }
}

impl fmt::Display for ProjectionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionItem::Column(name) => f.write_str(name),
            ProjectionItem::Call { function, column } => write!(f, "{}({})", function, column),
        }
    }
}

/// Conjunction of predicates, kept in query order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterExpr {
    pub predicates: Vec<Predicate>,
}

impl FilterExpr {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }
}

impl FromIterator<Predicate> for FilterExpr {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.predicates.iter().map(|p| p.to_string()).collect();
        f.write_str(&parts.join("&"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: Operator,
    pub literal: Literal,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: Operator, literal: Literal) -> Self {
        Self {
            column: column.into(),
            op,
            literal,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.column, self.op, self.literal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Lt,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }

    /// Whether every backend would evaluate this operator the way the
    /// engine does. Ordering operators are still provisional.
    pub fn is_settled(&self) -> bool {
        matches!(self, Operator::Eq | Operator::NotEq)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Number(_) => "number",
            Literal::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => {
                let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
                write!(f, "'{}'", escaped)
            }
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}
