//! Values exchanged with the database: bound parameters and result cells.

use std::fmt;

/// A single SQL value.
///
/// Mirrors the SQLite storage classes we read and write. Blobs never
/// appear in a PRM skeleton, so they are not modelled.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Interpret this value as an element of a discrete attribute domain.
    ///
    /// `ROUND(AVG(..))` comes back from SQLite as a REAL such as `1.0`, so
    /// integral reals are accepted. Anything else (NULL, fractional reals,
    /// non-numeric text) has no discrete reading.
    pub fn as_discrete(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(n) => Some(*n),
            SqlValue::Real(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(n) => write!(f, "{}", n),
            SqlValue::Real(r) => write!(f, "{:?}", r),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Integer(n)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        SqlValue::Real(f)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.into())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

/// A rendered statement: SQL text with `?` placeholders plus the values
/// bound to them, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<SqlValue>) -> Self {
        self.params = params;
        self
    }
}

impl fmt::Display for Statement {
    /// Formats the SQL followed by its bound values, for diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            let rendered: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, " -- params: [{}]", rendered.join(", "))?;
        }
        Ok(())
    }
}
