//! CPD estimation from observed data.
//!
//! Reads child and parent values with the same queries the materializer
//! uses (plus the child's own column), counts co-occurrences and
//! normalizes them into a [`CpdTabular`]. Held-out evaluation uses the
//! leave-one-out training sets of a [`DataRegistry`].

use thiserror::Error;

use crate::cpd::{CpdError, CpdTabular};
use crate::data::{DataError, DataRegistry, DataSetInterface, DatasetId};
use crate::model::{ModelError, Prm};
use crate::planner::{AttributePlanner, AttributeQuery, QueryError};
use crate::sql::{Dialect, SqlValue};

#[derive(Debug, Error)]
pub enum LearnError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("{attribute}: {source}")]
    Cpd {
        attribute: String,
        #[source]
        source: CpdError,
    },

    #[error("Training set refers to unknown dataset {0}")]
    UnknownDataset(DatasetId),

    #[error("No training sets computed; call compute_training_sets first")]
    NoTrainingSets,
}

pub type LearnResult<T> = Result<T, LearnError>;

/// Held-out score of one fold.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldScore {
    /// The held-out dataset.
    pub test: DatasetId,
    /// Sum of `ln P(value | parents)` over the held-out rows.
    pub log_likelihood: f64,
    /// Number of held-out rows with an observed value.
    pub rows: usize,
}

impl FoldScore {
    pub fn mean(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.log_likelihood / self.rows as f64
        }
    }
}

/// Observed `(parents, value)` pairs of one attribute in one dataset. Rows
/// without a value are skipped.
fn observations(
    query: &AttributeQuery,
    dsi: &dyn DataSetInterface,
) -> LearnResult<Vec<(Vec<i64>, i64)>> {
    let cpd_error = |source| LearnError::Cpd {
        attribute: query.attribute.clone(),
        source,
    };

    let mut out = Vec::new();
    for row in dsi.execute_query(&query.statement)? {
        let value = match query.value(&row) {
            Some(v) if !v.is_null() => discrete(v).map_err(cpd_error)?,
            _ => continue,
        };
        let parents = query
            .parents(&row)
            .iter()
            .map(discrete)
            .collect::<Result<Vec<_>, _>>()
            .map_err(cpd_error)?;
        out.push((parents, value));
    }
    Ok(out)
}

fn discrete(value: &SqlValue) -> Result<i64, CpdError> {
    value
        .as_discrete()
        .ok_or_else(|| CpdError::NonDiscreteValue(value.to_string()))
}

/// Maximum-likelihood CPD of `attr` over one or more datasets, with
/// `pseudo_count` added to every cell.
pub fn estimate_cpd(
    prm: &Prm,
    attr: &str,
    datasets: &[&dyn DataSetInterface],
    dialect: Dialect,
    pseudo_count: f64,
) -> LearnResult<CpdTabular> {
    let query = AttributePlanner::new(prm, dialect).select_with_value(attr)?;
    let cpd_error = |source| LearnError::Cpd {
        attribute: attr.to_string(),
        source,
    };

    let domain = prm
        .attribute(attr)
        .ok_or_else(|| ModelError::UnknownAttribute(attr.to_string()))?
        .domain
        .clone();
    let parent_domains = prm.parent_domains(attr)?;
    let shape = CpdTabular::uniform(domain.clone(), parent_domains.clone()).map_err(cpd_error)?;

    let mut counts = vec![vec![0.0; domain.len()]; shape.table().len()];
    let mut seen = 0usize;
    for dsi in datasets {
        for (parents, value) in observations(&query, *dsi)? {
            let row = shape.row_index(&parents).map_err(cpd_error)?;
            let col = shape.value_index(value).map_err(cpd_error)?;
            counts[row][col] += 1.0;
            seen += 1;
        }
    }

    tracing::debug!(attribute = attr, rows = seen, datasets = datasets.len(), "estimated CPD");
    CpdTabular::from_counts(domain, parent_domains, &counts, pseudo_count).map_err(cpd_error)
}

/// Sum of `ln P(value | parents)` of `attr` over one dataset. Returns the
/// sum and the number of rows scored.
pub fn log_likelihood(
    prm: &Prm,
    attr: &str,
    cpd: &CpdTabular,
    dsi: &dyn DataSetInterface,
    dialect: Dialect,
) -> LearnResult<(f64, usize)> {
    let query = AttributePlanner::new(prm, dialect).select_with_value(attr)?;
    let observed = observations(&query, dsi)?;

    let mut total = 0.0;
    for (parents, value) in &observed {
        let p = cpd
            .probability(parents, *value)
            .map_err(|source| LearnError::Cpd {
                attribute: attr.to_string(),
                source,
            })?;
        total += p.ln();
    }
    Ok((total, observed.len()))
}

/// Leave-one-out evaluation: for every training set of `registry`,
/// estimate on the training datasets and score the held-out one.
pub fn cross_validate(
    prm: &Prm,
    attr: &str,
    registry: &DataRegistry,
    dialect: Dialect,
    pseudo_count: f64,
) -> LearnResult<Vec<FoldScore>> {
    if registry.training_sets().is_empty() {
        return Err(LearnError::NoTrainingSets);
    }

    registry
        .training_sets()
        .iter()
        .map(|fold| -> LearnResult<FoldScore> {
            let train = fold
                .train
                .iter()
                .map(|&id| registry.dataset(id).ok_or(LearnError::UnknownDataset(id)))
                .collect::<LearnResult<Vec<_>>>()?;
            let test = registry
                .dataset(fold.test)
                .ok_or(LearnError::UnknownDataset(fold.test))?;

            let cpd = estimate_cpd(prm, attr, &train, dialect, pseudo_count)?;
            let (log_likelihood, rows) = log_likelihood(prm, attr, &cpd, test, dialect)?;
            tracing::info!(
                attribute = attr,
                test = fold.test,
                log_likelihood,
                rows,
                "scored fold"
            );
            Ok(FoldScore {
                test: fold.test,
                log_likelihood,
                rows,
            })
        })
        .collect()
}
