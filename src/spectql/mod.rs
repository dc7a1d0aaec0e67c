//! The SPECTQL query language: lexing, parsing, interpretation and result
//! conversion.
//!
//! A query names a resource, a projection, an optional conjunctive filter and
//! an optional format tag:
//!
//! ```text
//! /tabular/geo{Dist_Name,ucase(Prov_Name)}?Prov_Name=='Uruzgan'&Dist_ID>2502:json
//! ```

pub mod ast;
pub mod converter;
pub mod error;
pub mod functions;
pub mod interpreter;
pub mod lexer;
pub mod parser;

pub use ast::{FilterExpr, Literal, Operator, Predicate, Projection, ProjectionItem, Query, ResourcePath};
pub use converter::{convert, Record};
pub use error::{ErrorKind, ParseError, QueryError, Result, SpectqlError, SyntaxError};
pub use functions::{Aggregate, Function, FunctionKind, Scalar};
pub use interpreter::{Interpreter, ResultTable};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{parse_query, Parser};

use crate::storage::TableManager;

/// Parses, interprets and converts `query` in one step.
pub fn execute(manager: &TableManager, query: &str) -> Result<Vec<Record>> {
    let query = parse_query(query)?;
    let table = Interpreter::new(manager).interpret(&query)?;
    Ok(convert(table))
}
