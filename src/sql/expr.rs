//! Expression AST for the SQL the attribute planner emits.
//!
//! Structural parts (columns, functions, join predicates) become
//! identifiers and keywords; values only ever enter as [`Expr::Param`].

use super::dialect::Dialect;
use super::token::{Token, TokenStream};
use super::value::SqlValue;

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens()` - the compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Bound parameter
    Param(SqlValue),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Function call: name(args...)
    Function { name: String, args: Vec<Expr> },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    And,
}

impl Expr {
    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Param(value) => {
                ts.push(Token::Param(value.clone()));
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(match op {
                    BinaryOperator::Eq => Token::Eq,
                    BinaryOperator::And => Token::And,
                });
                ts.space();
                ts.append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::Function { name, args } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }
        }

        ts
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Create a qualified column reference (table.column).
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

/// Create a bound parameter.
pub fn param(value: impl Into<SqlValue>) -> Expr {
    Expr::Param(value.into())
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

/// ROUND(expr)
pub fn round(expr: Expr) -> Expr {
    func("ROUND", vec![expr])
}

/// Join a list of predicates with AND. Returns `None` for an empty list.
pub fn conjunction(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    predicates.into_iter().reduce(|acc, p| acc.and(p))
}

// =============================================================================
// Fluent Extension Trait
// =============================================================================

/// Fluent operators on expressions.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn eq(self, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op: BinaryOperator::Eq,
            right: Box::new(other.into()),
        }
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op: BinaryOperator::And,
            right: Box::new(other.into()),
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<SqlValue> for Expr {
    fn from(value: SqlValue) -> Self {
        Expr::Param(value)
    }
}
