//! SQL generation module.
//!
//! This module provides a type-safe SQL builder for the statements the
//! data-access layer issues. It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`dml`] - UPDATE builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations
//! - [`value`] - bound values and rendered statements

pub mod dialect;
pub mod dml;
pub mod expr;
pub mod query;
pub mod token;
pub mod value;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect, UnknownDialect};
pub use dml::Update;
pub use expr::{col, conjunction, func, param, round, table_col, BinaryOperator, Expr, ExprExt};
pub use query::{Query, TableRef};
pub use token::{Token, TokenStream};
pub use value::{SqlValue, Statement};
