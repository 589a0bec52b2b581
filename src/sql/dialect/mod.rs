//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (SQLite), `` ` `` (MySQL)
//! - Parameter placeholders
//! - Aggregate function keywords
//!
//! # Usage
//!
//! ```ignore
//! use probrem::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect: Dialect = "SQLite".parse()?;
//! let quoted = dialect.quote_identifier("Professor");  // "Professor"
//! ```

pub mod helpers;
mod mysql;
mod sqlite;

pub use mysql::MySql;
pub use sqlite::Sqlite;

use std::str::FromStr;

use crate::model::Aggregator;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Placeholder emitted for a bound parameter.
    fn placeholder(&self) -> &'static str {
        "?"
    }

    /// SQL keyword for an aggregator.
    fn aggregate_function(&self, agg: Aggregator) -> &'static str {
        match agg {
            Aggregator::Avg => "AVG",
            Aggregator::Sum => "SUM",
            Aggregator::Count => "COUNT",
            Aggregator::Min => "MIN",
            Aggregator::Max => "MAX",
        }
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Sqlite,
    MySql,
}

impl Dialect {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::MySql => &MySql,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn placeholder(&self) -> &'static str {
        self.dialect().placeholder()
    }

    fn aggregate_function(&self, agg: Aggregator) -> &'static str {
        self.dialect().aggregate_function(agg)
    }
}

/// Error for an unrecognised dialect name.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown SQL dialect: {0}")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    /// Parses dialect names case-insensitively (`SQLite`, `sqlite`, `MySQL`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::MySql),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
