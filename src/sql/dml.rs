//! Data Manipulation Language: UPDATE.
//!
//! The materializer only ever rewrites one attribute column per row, so
//! UPDATE is the single DML statement we build. Assigned values and key
//! values are bound parameters.

use super::dialect::Dialect;
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};
use super::value::Statement;

/// UPDATE statement builder.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "Update has no effect until rendered with to_statement()"]
pub struct Update {
    pub table: String,
    pub set: Vec<(String, Expr)>,
    pub filter: Option<Expr>,
}

impl Update {
    /// Create a new UPDATE statement.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            filter: None,
        }
    }

    /// Set a column to a value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    /// Add WHERE clause (ANDed with existing conditions).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Render with bound parameters for the given dialect.
    pub fn to_statement(&self, dialect: Dialect) -> Statement {
        self.to_tokens(dialect).to_statement(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // UPDATE table
        ts.push(Token::Update)
            .space()
            .push(Token::Ident(self.table.clone()));

        // SET clause
        ts.space().push(Token::Set).space();
        for (i, (col, expr)) in self.set.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(col.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .append(&expr.to_tokens_for_dialect(dialect));
        }

        // WHERE clause
        if let Some(ref filter) = self.filter {
            ts.space()
                .push(Token::Where)
                .space()
                .append(&filter.to_tokens_for_dialect(dialect));
        }

        ts
    }
}
