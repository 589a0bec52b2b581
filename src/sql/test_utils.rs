//! Test utilities for SQL emission validation.
//!
//! Provides helpers for validating that emitted SQL is syntactically correct
//! using sqlparser-rs for roundtrip validation.

use sqlparser::dialect::{MySqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Validates that a SQL string is syntactically valid for the given dialect.
///
/// Uses sqlparser-rs to parse the SQL and returns an error if parsing fails.
/// Placeholders (`?`) are accepted by both parser dialects.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT \"a\" FROM \"t\" GROUP BY \"a\"", Dialect::Sqlite).unwrap();
        validate_sql("UPDATE `t` SET `a` = ? WHERE `id` = ?", Dialect::MySql).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        assert!(validate_sql("SELECT FROM WHERE", Dialect::Sqlite).is_err());
    }
}
