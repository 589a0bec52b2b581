//! Query builder - construct SELECT statements with a fluent API.
//!
//! Joins are expressed the way slot-chains describe them: every table in a
//! comma-separated FROM list, with the join predicates in the WHERE clause.

use super::dialect::Dialect;
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};
use super::value::Statement;

// =============================================================================
// Table Reference
// =============================================================================

/// A table in the FROM list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.table.clone()));
        ts
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until rendered with to_statement()"]
pub struct Query {
    pub select: Vec<Expr>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<Expr>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SELECT list.
    pub fn select(mut self, exprs: Vec<Expr>) -> Self {
        self.select = exprs;
        self
    }

    /// Add a table to the FROM list. Tables already present are skipped.
    pub fn from(mut self, table: TableRef) -> Self {
        if !self.from.contains(&table) {
            self.from.push(table);
        }
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Set the GROUP BY clause.
    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    /// Set the ORDER BY clause (ascending).
    pub fn order_by(mut self, exprs: Vec<Expr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // SELECT
        ts.push(Token::Select).space();
        append_list(&mut ts, &self.select, dialect);

        // FROM
        if !self.from.is_empty() {
            ts.space().push(Token::From).space();
            for (i, table) in self.from.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&table.to_tokens());
            }
        }

        // WHERE
        if let Some(ref filter) = self.where_clause {
            ts.space().push(Token::Where).space();
            ts.append(&filter.to_tokens_for_dialect(dialect));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.space().push(Token::GroupBy).space();
            append_list(&mut ts, &self.group_by, dialect);
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            ts.space().push(Token::OrderBy).space();
            append_list(&mut ts, &self.order_by, dialect);
        }

        ts
    }

    /// Render with bound parameters for a specific dialect.
    pub fn to_statement(&self, dialect: Dialect) -> Statement {
        self.to_tokens_for_dialect(dialect).to_statement(dialect)
    }
}

fn append_list(ts: &mut TokenStream, exprs: &[Expr], dialect: Dialect) {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&expr.to_tokens_for_dialect(dialect));
    }
}
