//! SQLite SQL dialect.
//!
//! SQLite differences from ANSI that matter here:
//! - Double-quote identifier quoting, `?` positional placeholders
//! - Aggregates and ROUND() return REAL for non-integer input

use super::helpers;
use super::SqlDialect;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }
}
