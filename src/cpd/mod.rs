//! Conditional probability distributions.
//!
//! A CPD maps a tuple of parent values to a distribution over the values of
//! one attribute. The [`CpdSampler`] contract is all the materializer needs;
//! [`CpdTabular`] is the table-backed implementation used for discrete
//! attributes.

mod tabular;

pub use tabular::CpdTabular;

use rand::RngCore;

/// Errors raised by CPD construction, lookup and persistence.
#[derive(Debug, thiserror::Error)]
pub enum CpdError {
    /// The parent tuple does not index any row of the table.
    #[error("parent values {values:?} do not index any row of the CPD")]
    UnknownParentValue { values: Vec<i64> },

    /// A value read from the database has no discrete reading.
    #[error("value {0} is not a discrete domain value")]
    NonDiscreteValue(String),

    /// A child value outside the attribute domain.
    #[error("value {0} is outside the attribute domain")]
    UnknownValue(i64),

    #[error("expected {expected} parent values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CpdResult<T> = Result<T, CpdError>;

/// Draws a value for an attribute given the values of its parents.
///
/// `parent_values` is empty for an attribute without parents. The same
/// parent tuple and the same random stream must always yield the same
/// value.
pub trait CpdSampler {
    /// Number of parent values `sample` expects.
    fn arity(&self) -> usize;

    fn sample(&self, parent_values: &[i64], rng: &mut dyn RngCore) -> CpdResult<i64>;
}
