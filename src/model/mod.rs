//! Probabilistic relational model.
//!
//! A [`Prm`] holds the entity/relationship classes of a relational
//! skeleton, the probabilistic attributes defined on them, and the
//! dependencies between attributes. Building a `Prm` validates references
//! and computes the topological order of attributes once.

pub mod graph;
pub mod loader;
pub mod prm;
pub mod types;

pub use graph::DependencyGraph;
pub use loader::{load_model, parse_model, LoadError};
pub use prm::{Prm, PrmBuilder};
pub use types::{
    Aggregator, Attribute, ClassKind, ColumnRef, Dependency, ErClass, JoinPredicate,
    UnknownAggregator,
};

use thiserror::Error;

use crate::cpd::CpdError;

/// Errors raised while assembling or querying a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Duplicate class: {0}")]
    DuplicateClass(String),

    #[error("Duplicate attribute: {0}")]
    DuplicateAttribute(String),

    #[error("Class '{0}' has an empty primary key")]
    EmptyPrimaryKey(String),

    #[error("'{0}' has an empty domain")]
    EmptyDomain(String),

    #[error("'{name}' lists domain value {value} more than once")]
    DuplicateDomainValue { name: String, value: i64 },

    /// The dependency graph has a cycle through these attributes.
    #[error("Cyclic dependency between attributes: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("No CPD available for attribute '{0}'")]
    MissingCpd(String),

    /// A CPD does not fit the attribute it was attached to.
    #[error("CPD for '{attribute}' does not match the model: {message}")]
    CpdMismatch { attribute: String, message: String },

    #[error("Failed to load CPD for '{attribute}': {source}")]
    CpdLoad {
        attribute: String,
        #[source]
        source: CpdError,
    },
}

pub type ModelResult<T> = Result<T, ModelError>;
