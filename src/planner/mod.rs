//! Attribute query builder.
//!
//! Turns the dependencies of one attribute into the SELECT that reads its
//! instances together with their parent values, and builds the UPDATE that
//! writes a sampled value back to one instance.
//!
//! Row layout of every SELECT built here:
//!
//! ```text
//! pk_1, .., pk_n, [own value], parent_1, .., parent_m
//! ```
//!
//! Parent values follow the declaration order of the dependencies.

mod slotchain;

use thiserror::Error;

use crate::model::{Attribute, ErClass, ModelError, Prm, UnknownAggregator};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{col, conjunction, func, param, round, table_col, Expr, ExprExt};
use crate::sql::{Query, SqlValue, Statement, TableRef, Update};

/// Errors raised while building an attribute's queries. All of them are
/// detected before any SQL is produced.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Dependency {dependency} has an empty slot-chain")]
    EmptySlotchain { dependency: String },

    #[error("Dependency {dependency}: slot-chain must start at class '{expected}', found '{found}'")]
    SlotchainStart {
        dependency: String,
        expected: String,
        found: String,
    },

    #[error("Dependency {dependency}: slot-chain must end at class '{expected}', found '{found}'")]
    SlotchainEnd {
        dependency: String,
        expected: String,
        found: String,
    },

    #[error("Dependency {dependency}: unknown class '{class}' in slot-chain")]
    UnknownClass { dependency: String, class: String },

    /// A class visited twice would need two aliases of one table.
    #[error("Dependency {dependency}: class '{class}' appears more than once in the slot-chain")]
    RepeatedClass { dependency: String, class: String },

    #[error("Dependency {dependency}: join '{join}' references '{table}', which is not in the slot-chain")]
    JoinOutsideSlotchain {
        dependency: String,
        join: String,
        table: String,
    },

    #[error("Dependency {dependency}: no join predicate links '{from}' and '{to}'")]
    DisconnectedSlotchain {
        dependency: String,
        from: String,
        to: String,
    },

    #[error("Dependency {dependency} crosses classes but declares no joins")]
    MissingJoins { dependency: String },

    #[error("Dependency {dependency}: {source}")]
    UnknownAggregator {
        dependency: String,
        #[source]
        source: UnknownAggregator,
    },

    #[error("Class '{class}' has {expected} key columns, got {actual} key values")]
    PrimaryKeyLength {
        class: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// A SELECT for one attribute together with the shape of its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeQuery {
    /// Qualified attribute name.
    pub attribute: String,
    pub statement: Statement,
    /// Number of leading primary key columns.
    pub pk_len: usize,
    /// Whether the attribute's own column follows the key.
    pub with_value: bool,
    /// Number of trailing parent value columns.
    pub parent_count: usize,
}

impl AttributeQuery {
    /// Expected number of columns per row.
    pub fn width(&self) -> usize {
        self.pk_len + usize::from(self.with_value) + self.parent_count
    }

    /// Primary key part of a result row.
    pub fn pk<'r>(&self, row: &'r [SqlValue]) -> &'r [SqlValue] {
        row.get(..self.pk_len).unwrap_or(row)
    }

    /// The attribute's own value, for queries built with the value column.
    pub fn value<'r>(&self, row: &'r [SqlValue]) -> Option<&'r SqlValue> {
        if self.with_value {
            row.get(self.pk_len)
        } else {
            None
        }
    }

    /// Parent values of a result row, in dependency order.
    pub fn parents<'r>(&self, row: &'r [SqlValue]) -> &'r [SqlValue] {
        let start = self.pk_len + usize::from(self.with_value);
        row.get(start..).unwrap_or(&[])
    }
}

/// Builds attribute queries against one model in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct AttributePlanner<'a> {
    prm: &'a Prm,
    dialect: Dialect,
}

impl<'a> AttributePlanner<'a> {
    pub fn new(prm: &'a Prm, dialect: Dialect) -> Self {
        Self { prm, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// SELECT returning each instance's key followed by its parent values.
    ///
    /// ```text
    /// SELECT "Student"."student_id", ROUND(AVG("Professor"."fame"))
    /// FROM "Student", "advisor", "Professor"
    /// WHERE "Student"."student_id" = "advisor"."student_id" AND ...
    /// GROUP BY "Student"."student_id" ORDER BY "Student"."student_id"
    /// ```
    pub fn select_for(&self, attr: &str) -> QueryResult<AttributeQuery> {
        self.build_select(attr, false)
    }

    /// Like [`select_for`](Self::select_for), with the attribute's own
    /// column right after the key. Used to read observed values.
    pub fn select_with_value(&self, attr: &str) -> QueryResult<AttributeQuery> {
        self.build_select(attr, true)
    }

    /// UPDATE writing `value` to the instance of `attr` identified by
    /// `pk_values`. Values are bound, never inlined.
    pub fn update_for(
        &self,
        attr: &str,
        pk_values: &[SqlValue],
        value: i64,
    ) -> QueryResult<Statement> {
        let (attribute, class) = self.resolve(attr)?;
        if pk_values.len() != class.pk.len() {
            return Err(QueryError::PrimaryKeyLength {
                class: class.name.clone(),
                expected: class.pk.len(),
                actual: pk_values.len(),
            });
        }

        let update = class
            .pk
            .iter()
            .zip(pk_values)
            .fold(
                Update::table(&class.name).set(&attribute.name, param(value)),
                |update, (column, key)| update.filter(col(column).eq(param(key.clone()))),
            );
        Ok(update.to_statement(self.dialect))
    }

    fn build_select(&self, attr: &str, with_value: bool) -> QueryResult<AttributeQuery> {
        let (attribute, class) = self.resolve(attr)?;
        let dependencies = self.prm.dependencies_child(attr)?;

        let pk: Vec<Expr> = class
            .pk
            .iter()
            .map(|c| table_col(&class.name, c))
            .collect();

        let mut select = pk.clone();
        if with_value {
            select.push(table_col(&class.name, &attribute.name));
        }

        let mut query = Query::new().from(TableRef::new(&class.name));
        let mut predicates = Vec::new();
        for dep in &dependencies {
            let parent = self
                .prm
                .attribute(&dep.parent)
                .ok_or_else(|| QueryError::UnknownAttribute(dep.parent.clone()))?;
            let aggregator = slotchain::validate(self.prm, dep, attribute, parent)?;

            let column = table_col(&parent.class, &parent.name);
            select.push(match aggregator {
                Some(agg) => round(func(
                    self.dialect.aggregate_function(agg),
                    vec![column],
                )),
                None => column,
            });

            for class in &dep.slotchain {
                query = query.from(TableRef::new(class));
            }
            predicates.extend(dep.joins.iter().map(|join| {
                table_col(&join.left.table, &join.left.column)
                    .eq(table_col(&join.right.table, &join.right.column))
            }));
        }
        if let Some(condition) = conjunction(predicates) {
            query = query.filter(condition);
        }

        let query = query
            .select(select)
            .group_by(pk.clone())
            .order_by(pk);

        let statement = query.to_statement(self.dialect);
        tracing::debug!(attribute = attr, sql = %statement.sql, "planned attribute query");

        Ok(AttributeQuery {
            attribute: attr.to_string(),
            statement,
            pk_len: class.pk.len(),
            with_value,
            parent_count: dependencies.len(),
        })
    }

    fn resolve(&self, attr: &str) -> QueryResult<(&'a Attribute, &'a ErClass)> {
        let attribute = self
            .prm
            .attribute(attr)
            .ok_or_else(|| QueryError::UnknownAttribute(attr.to_string()))?;
        let class = self.prm.er_class(attr)?;
        Ok((attribute, class))
    }
}
