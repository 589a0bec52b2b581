//! SQL Tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize
//! to dialect-specific strings. Values never become SQL text: a
//! [`Token::Param`] serializes to a placeholder and its value is collected
//! separately by [`TokenStream::to_statement`].

use super::dialect::{Dialect, SqlDialect};
use super::value::{SqlValue, Statement};

/// SQL Token - every element the attribute queries need.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    GroupBy,
    OrderBy,
    Update,
    Set,

    // === Punctuation ===
    Comma,
    Dot,
    LParen,
    RParen,

    // === Operators ===
    Eq,

    // === Whitespace ===
    Space,

    // === Dynamic Content ===
    /// Simple identifier (table, column)
    Ident(String),
    /// Function name, upper-cased on output
    FunctionName(String),
    /// Bound parameter; serializes to the dialect's placeholder
    Param(SqlValue),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Update => "UPDATE".into(),
            Token::Set => "SET".into(),

            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Eq => "=".into(),

            Token::Space => " ".into(),

            Token::Ident(name) => dialect.quote_identifier(name),
            Token::FunctionName(name) => name.to_uppercase(),
            Token::Param(_) => dialect.placeholder().into(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    /// Serialize to a [`Statement`], collecting parameter values in
    /// placeholder order.
    pub fn to_statement(&self, dialect: Dialect) -> Statement {
        let params = self
            .tokens
            .iter()
            .filter_map(|t| match t {
                Token::Param(v) => Some(v.clone()),
                _ => None,
            })
            .collect();
        Statement::new(self.serialize(dialect)).with_params(params)
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
