//! Dataset materializer.
//!
//! Fills the probabilistic attributes of a relational skeleton by forward
//! sampling. Attributes are processed in topological order so every parent
//! value is in the database before its children read it. Each attribute is
//! written inside its own transaction:
//!
//! 1. `BEGIN DEFERRED`
//! 2. SELECT key and parent values of every instance
//! 3. sample a value per row from the attribute's CPD
//! 4. UPDATE the row
//! 5. `COMMIT`, or `ROLLBACK` on the first failure
//!
//! Attributes committed before a failure stay committed; a later run can
//! resume with [`GenerateOptions::start_from`].

use std::path::Path;

use rand::RngCore;
use thiserror::Error;

use crate::cpd::{CpdError, CpdSampler, CpdTabular};
use crate::data::{DataError, DataSetInterface};
use crate::model::{ModelError, Prm};
use crate::planner::{AttributePlanner, AttributeQuery, QueryError};
use crate::sql::{Dialect, SqlValue};

/// Errors raised while materializing a dataset.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Query construction failed. Raised before anything is written.
    #[error("Failed to plan queries: {0}")]
    Plan(#[from] QueryError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Cannot resume from '{0}': not an attribute of the model")]
    UnknownStartAttribute(String),

    /// The CPD and the attribute's query disagree on the number of parents.
    /// Raised before anything is written.
    #[error("CPD for {attribute} takes {expected} parent values, its query yields {actual}")]
    CpdArity {
        attribute: String,
        expected: usize,
        actual: usize,
    },

    /// The dataset already has an open transaction, which stays untouched.
    #[error("Dataset {0} already has an open transaction")]
    TransactionOpen(String),

    /// A statement failed; the attribute's transaction was rolled back.
    #[error("Database error while generating {attribute}: {source}")]
    Database {
        attribute: String,
        #[source]
        source: DataError,
    },

    /// Sampling failed for one row; the attribute's transaction was rolled
    /// back.
    #[error("Sampling failed for {attribute} (row {row}): {source}")]
    Sample {
        attribute: String,
        row: usize,
        #[source]
        source: CpdError,
    },

    /// A ground-truth CPD could not be created or saved.
    #[error("Failed to create CPD for {attribute}: {source}")]
    Cpd {
        attribute: String,
        #[source]
        source: CpdError,
    },
}

pub type GenerateResult<T> = Result<T, GenerateError>;

/// Options of one materializer run.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Skip every attribute before this one in topological order.
    pub start_from: Option<String>,
}

/// Outcome for one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeReport {
    pub attribute: String,
    pub rows_read: usize,
    pub rows_updated: usize,
}

/// Outcome of a run over one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub dataset: String,
    /// Processed attributes, in the order they were committed.
    pub attributes: Vec<AttributeReport>,
}

impl GenerationReport {
    pub fn rows_updated(&self) -> usize {
        self.attributes.iter().map(|a| a.rows_updated).sum()
    }
}

/// Writes sampled attribute values into datasets.
#[derive(Debug, Clone)]
pub struct Materializer<'a> {
    prm: &'a Prm,
    planner: AttributePlanner<'a>,
    options: GenerateOptions,
}

impl<'a> Materializer<'a> {
    pub fn new(prm: &'a Prm, dialect: Dialect) -> Self {
        Self {
            prm,
            planner: AttributePlanner::new(prm, dialect),
            options: GenerateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the SELECT of every attribute this run will process, in
    /// topological order, and check each has a CPD taking as many parent
    /// values as the SELECT yields. Nothing touches a database.
    pub fn plan(&self) -> GenerateResult<Vec<AttributeQuery>> {
        let order = self.prm.topo_sort_attributes();
        let start = match &self.options.start_from {
            Some(name) => order
                .iter()
                .position(|a| a.qualified_name() == *name)
                .ok_or_else(|| GenerateError::UnknownStartAttribute(name.clone()))?,
            None => 0,
        };

        order[start..]
            .iter()
            .map(|attribute| -> GenerateResult<AttributeQuery> {
                let name = attribute.qualified_name();
                let cpd = self.prm.cpd(&name)?;
                let query = self.planner.select_for(&name)?;
                check_arity(cpd, &query)?;
                Ok(query)
            })
            .collect()
    }

    /// Materialize every planned attribute of one dataset.
    pub fn run(
        &self,
        dsi: &mut dyn DataSetInterface,
        rng: &mut dyn RngCore,
    ) -> GenerateResult<GenerationReport> {
        let queries = self.plan()?;
        let dataset = dsi.describe();
        if dsi.in_transaction() {
            return Err(GenerateError::TransactionOpen(dataset));
        }
        tracing::info!(%dataset, attributes = queries.len(), "generating dataset");

        let mut report = GenerationReport {
            dataset,
            attributes: Vec::with_capacity(queries.len()),
        };

        for query in &queries {
            let attribute = &query.attribute;
            let cpd = self.prm.cpd(attribute)?;

            dsi.begin().map_err(|source| GenerateError::Database {
                attribute: attribute.clone(),
                source,
            })?;

            let outcome = self
                .materialize(dsi, query, cpd, rng)
                .and_then(|done| {
                    dsi.commit().map_err(|source| GenerateError::Database {
                        attribute: attribute.clone(),
                        source,
                    })?;
                    Ok(done)
                });

            match outcome {
                Ok(done) => {
                    tracing::info!(
                        attribute = %attribute,
                        rows = done.rows_updated,
                        "committed attribute"
                    );
                    report.attributes.push(done);
                }
                Err(err) => {
                    tracing::warn!(attribute = %attribute, error = %err, "rolling back attribute");
                    if dsi.in_transaction() {
                        if let Err(rollback) = dsi.rollback() {
                            tracing::warn!(error = %rollback, "rollback failed");
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(report)
    }

    fn materialize(
        &self,
        dsi: &mut dyn DataSetInterface,
        query: &AttributeQuery,
        cpd: &dyn CpdSampler,
        rng: &mut dyn RngCore,
    ) -> GenerateResult<AttributeReport> {
        let attribute = &query.attribute;
        let database = |source| GenerateError::Database {
            attribute: attribute.clone(),
            source,
        };

        let rows = dsi.execute_query(&query.statement).map_err(database)?;
        let mut rows_updated = 0;

        for (row_index, row) in rows.iter().enumerate() {
            let sample_error = |source| GenerateError::Sample {
                attribute: attribute.clone(),
                row: row_index,
                source,
            };

            let parents = discrete_values(query.parents(row)).map_err(sample_error)?;
            let value = cpd.sample(&parents, rng).map_err(sample_error)?;

            let update = self.planner.update_for(attribute, query.pk(row), value)?;
            rows_updated += dsi.execute_update(&update).map_err(database)?;
        }

        Ok(AttributeReport {
            attribute: attribute.clone(),
            rows_read: rows.len(),
            rows_updated,
        })
    }
}

fn check_arity(cpd: &dyn CpdSampler, query: &AttributeQuery) -> GenerateResult<()> {
    if cpd.arity() == query.parent_count {
        Ok(())
    } else {
        Err(GenerateError::CpdArity {
            attribute: query.attribute.clone(),
            expected: cpd.arity(),
            actual: query.parent_count,
        })
    }
}

fn discrete_values(values: &[SqlValue]) -> Result<Vec<i64>, CpdError> {
    values
        .iter()
        .map(|v| {
            v.as_discrete()
                .ok_or_else(|| CpdError::NonDiscreteValue(v.to_string()))
        })
        .collect()
}

/// Give every attribute without a CPD a random one, in topological order.
///
/// With `cpd_dir`, each new CPD is also saved there as
/// `<Class>.<attribute>.json`. Returns the attributes that received a CPD.
pub fn generate_missing_cpds(
    prm: &mut Prm,
    cpd_dir: Option<&Path>,
    rng: &mut dyn RngCore,
) -> GenerateResult<Vec<String>> {
    let missing: Vec<(String, Vec<i64>)> = prm
        .missing_cpds()
        .into_iter()
        .map(|a| (a.qualified_name(), a.domain.clone()))
        .collect();

    for (name, domain) in &missing {
        let cpd_error = |source| GenerateError::Cpd {
            attribute: name.clone(),
            source,
        };
        let parent_domains = prm.parent_domains(name)?;
        let cpd = CpdTabular::random(domain.clone(), parent_domains, rng).map_err(cpd_error)?;
        if let Some(dir) = cpd_dir {
            let path = dir.join(format!("{name}.json"));
            cpd.save(&path).map_err(cpd_error)?;
            tracing::info!(attribute = %name, path = %path.display(), "saved generated CPD");
        }
        prm.set_cpd(name, cpd)?;
    }

    Ok(missing.into_iter().map(|(name, _)| name).collect())
}
