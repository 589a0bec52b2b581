//! Tabular CPD over discrete domains.
//!
//! Rows enumerate the cartesian product of the parent domains, first parent
//! most significant; columns follow the attribute domain. For a CPD
//! `P(funding | fame)` with `fame ∈ {0, 1}` the table
//!
//! ```text
//!            funding=0  funding=1
//! fame=0  [     0.7,       0.3   ]
//! fame=1  [     0.2,       0.8   ]
//! ```
//!
//! is stored as `[[0.7, 0.3], [0.2, 0.8]]`.

use std::fs;
use std::path::Path;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{CpdError, CpdResult, CpdSampler};

/// Row sums may drift this far from 1.0.
const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// On-disk shape of a tabular CPD.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CpdFile {
    domain: Vec<i64>,
    #[serde(default)]
    parent_domains: Vec<Vec<i64>>,
    table: Vec<Vec<f64>>,
}

/// A conditional probability table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CpdFile", into = "CpdFile")]
pub struct CpdTabular {
    domain: Vec<i64>,
    parent_domains: Vec<Vec<i64>>,
    table: Vec<Vec<f64>>,
    cumulative: Vec<Vec<f64>>,
}

impl CpdTabular {
    /// Build a CPD, validating its shape and that every row is a
    /// distribution.
    pub fn new(
        domain: Vec<i64>,
        parent_domains: Vec<Vec<i64>>,
        table: Vec<Vec<f64>>,
    ) -> CpdResult<Self> {
        check_domain("attribute", &domain)?;
        for (i, pd) in parent_domains.iter().enumerate() {
            check_domain(&format!("parent {}", i), pd)?;
        }

        let rows = row_count(&parent_domains);
        if table.len() != rows {
            return Err(CpdError::InvalidDistribution(format!(
                "expected {} rows for the parent domains, found {}",
                rows,
                table.len()
            )));
        }

        let mut cumulative = Vec::with_capacity(rows);
        for (r, row) in table.iter().enumerate() {
            if row.len() != domain.len() {
                return Err(CpdError::InvalidDistribution(format!(
                    "row {} has {} entries, domain has {}",
                    r,
                    row.len(),
                    domain.len()
                )));
            }
            if row.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(CpdError::InvalidDistribution(format!(
                    "row {} contains a negative or non-finite probability",
                    r
                )));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(CpdError::InvalidDistribution(format!(
                    "row {} sums to {}",
                    r, sum
                )));
            }

            let mut acc = 0.0;
            let mut cum: Vec<f64> = row
                .iter()
                .map(|p| {
                    acc += p;
                    acc
                })
                .collect();
            // Pin the last bucket so u < 1.0 always lands somewhere.
            if let Some(last) = cum.last_mut() {
                *last = 1.0;
            }
            cumulative.push(cum);
        }

        Ok(Self {
            domain,
            parent_domains,
            table,
            cumulative,
        })
    }

    /// Every row uniform.
    pub fn uniform(domain: Vec<i64>, parent_domains: Vec<Vec<i64>>) -> CpdResult<Self> {
        let n = domain.len().max(1);
        let rows = row_count(&parent_domains);
        let table = vec![vec![1.0 / n as f64; domain.len()]; rows];
        Self::new(domain, parent_domains, table)
    }

    /// Draw every row uniformly from the probability simplex.
    ///
    /// Used to produce ground-truth CPDs for artificial datasets.
    pub fn random(
        domain: Vec<i64>,
        parent_domains: Vec<Vec<i64>>,
        rng: &mut dyn RngCore,
    ) -> CpdResult<Self> {
        let rows = row_count(&parent_domains);
        let table = (0..rows)
            .map(|_| {
                // Normalised unit exponentials are Dirichlet(1, .., 1).
                let weights: Vec<f64> = (0..domain.len())
                    .map(|_| -(1.0 - rng.random::<f64>()).ln())
                    .collect();
                let total: f64 = weights.iter().sum();
                if total > 0.0 {
                    weights.iter().map(|w| w / total).collect()
                } else {
                    vec![1.0 / domain.len() as f64; domain.len()]
                }
            })
            .collect();
        Self::new(domain, parent_domains, table)
    }

    /// Maximum-likelihood table from co-occurrence counts, smoothed with
    /// `pseudo_count` per cell. Rows without any mass become uniform.
    pub fn from_counts(
        domain: Vec<i64>,
        parent_domains: Vec<Vec<i64>>,
        counts: &[Vec<f64>],
        pseudo_count: f64,
    ) -> CpdResult<Self> {
        let table = counts
            .iter()
            .map(|row| {
                let smoothed: Vec<f64> = row.iter().map(|c| c + pseudo_count).collect();
                let total: f64 = smoothed.iter().sum();
                if total > 0.0 {
                    smoothed.iter().map(|c| c / total).collect()
                } else {
                    vec![1.0 / row.len().max(1) as f64; row.len()]
                }
            })
            .collect();
        Self::new(domain, parent_domains, table)
    }

    pub fn domain(&self) -> &[i64] {
        &self.domain
    }

    pub fn parent_domains(&self) -> &[Vec<i64>] {
        &self.parent_domains
    }

    pub fn table(&self) -> &[Vec<f64>] {
        &self.table
    }

    /// Index of the table row selected by a parent tuple.
    pub fn row_index(&self, parent_values: &[i64]) -> CpdResult<usize> {
        if parent_values.len() != self.parent_domains.len() {
            return Err(CpdError::ArityMismatch {
                expected: self.parent_domains.len(),
                actual: parent_values.len(),
            });
        }

        let mut index = 0;
        for (value, domain) in parent_values.iter().zip(&self.parent_domains) {
            let pos = domain.iter().position(|d| d == value).ok_or_else(|| {
                CpdError::UnknownParentValue {
                    values: parent_values.to_vec(),
                }
            })?;
            index = index * domain.len() + pos;
        }
        Ok(index)
    }

    /// Index of a value in the attribute domain.
    pub fn value_index(&self, value: i64) -> CpdResult<usize> {
        self.domain
            .iter()
            .position(|d| *d == value)
            .ok_or(CpdError::UnknownValue(value))
    }

    /// `P(value | parent_values)`.
    pub fn probability(&self, parent_values: &[i64], value: i64) -> CpdResult<f64> {
        let row = self.row_index(parent_values)?;
        let col = self.value_index(value)?;
        Ok(self.table[row][col])
    }

    /// Write the CPD as JSON.
    pub fn save(&self, path: &Path) -> CpdResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a CPD previously written by [`CpdTabular::save`].
    pub fn load(path: &Path) -> CpdResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl CpdSampler for CpdTabular {
    fn arity(&self) -> usize {
        self.parent_domains.len()
    }

    fn sample(&self, parent_values: &[i64], rng: &mut dyn RngCore) -> CpdResult<i64> {
        let row = &self.cumulative[self.row_index(parent_values)?];
        let u: f64 = rng.random();
        let pos = row
            .iter()
            .position(|c| u < *c)
            .unwrap_or(row.len() - 1);
        Ok(self.domain[pos])
    }
}

impl TryFrom<CpdFile> for CpdTabular {
    type Error = CpdError;

    fn try_from(file: CpdFile) -> Result<Self, Self::Error> {
        CpdTabular::new(file.domain, file.parent_domains, file.table)
    }
}

impl From<CpdTabular> for CpdFile {
    fn from(cpd: CpdTabular) -> Self {
        CpdFile {
            domain: cpd.domain,
            parent_domains: cpd.parent_domains,
            table: cpd.table,
        }
    }
}

fn row_count(parent_domains: &[Vec<i64>]) -> usize {
    parent_domains.iter().map(Vec::len).product()
}

fn check_domain(what: &str, domain: &[i64]) -> CpdResult<()> {
    if domain.is_empty() {
        return Err(CpdError::InvalidDistribution(format!(
            "{} domain is empty",
            what
        )));
    }
    let mut sorted = domain.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != domain.len() {
        return Err(CpdError::InvalidDistribution(format!(
            "{} domain has duplicate values",
            what
        )));
    }
    Ok(())
}
