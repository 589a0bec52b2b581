//! Registry of the datasets used in one run.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::{DataResult, DataSetInterface};
use crate::model::Prm;

/// Position of a dataset in the registry.
pub type DatasetId = usize;

/// How the registered datasets are meant to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DiType {
    CrossValidation,
    TestTraining,
    #[default]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown data interface type: {0}")]
pub struct UnknownDiType(pub String);

impl FromStr for DiType {
    type Err = UnknownDiType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "crossvalidation" => Ok(DiType::CrossValidation),
            "testtraining" => Ok(DiType::TestTraining),
            "" | "unspecified" => Ok(DiType::Unspecified),
            _ => Err(UnknownDiType(s.to_string())),
        }
    }
}

impl TryFrom<String> for DiType {
    type Error = UnknownDiType;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for DiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiType::CrossValidation => "CrossValidation",
            DiType::TestTraining => "TestTraining",
            DiType::Unspecified => "Unspecified",
        })
    }
}

/// One leave-one-out fold: train on every dataset except `test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSet {
    pub test: DatasetId,
    pub train: Vec<DatasetId>,
}

/// Owns the dataset interfaces of a run.
///
/// Interfaces keep the order they were registered in; that order is the
/// [`DatasetId`]. Dropping the registry closes every connection.
#[derive(Debug, Default)]
pub struct DataRegistry {
    name: String,
    di_type: DiType,
    dsi: Vec<Box<dyn DataSetInterface>>,
    training_sets: Vec<TrainingSet>,
}

impl DataRegistry {
    pub fn new(name: impl Into<String>, di_type: DiType) -> Self {
        Self {
            name: name.into(),
            di_type,
            dsi: Vec::new(),
            training_sets: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn di_type(&self) -> DiType {
        self.di_type
    }

    /// Add an interface. Training sets are not recomputed.
    pub fn register(&mut self, dsi: Box<dyn DataSetInterface>) -> DatasetId {
        tracing::debug!(registry = %self.name, dataset = %dsi.describe(), "registered dataset");
        self.dsi.push(dsi);
        self.dsi.len() - 1
    }

    /// All registered interfaces, in registration order.
    pub fn dsi(&self) -> &[Box<dyn DataSetInterface>] {
        &self.dsi
    }

    pub fn len(&self) -> usize {
        self.dsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dsi.is_empty()
    }

    pub fn dataset(&self, id: DatasetId) -> Option<&dyn DataSetInterface> {
        match self.dsi.get(id) {
            Some(dsi) => Some(dsi.as_ref()),
            None => None,
        }
    }

    pub fn dataset_mut(&mut self, id: DatasetId) -> Option<&mut dyn DataSetInterface> {
        match self.dsi.get_mut(id) {
            Some(dsi) => Some(dsi.as_mut()),
            None => None,
        }
    }

    /// Prepare the datasets for a model.
    ///
    /// Nothing needs preparing while per-attribute views are disabled, so
    /// this only records the binding.
    pub fn configure(&mut self, prm: &Prm) {
        tracing::info!(
            registry = %self.name,
            model = prm.name(),
            datasets = self.dsi.len(),
            "configured data interface (views disabled)"
        );
    }

    /// Rebuild the leave-one-out partition: for every dataset, one
    /// training set holding all other datasets in registration order.
    pub fn compute_training_sets(&mut self) -> &[TrainingSet] {
        let n = self.dsi.len();
        self.training_sets = (0..n)
            .map(|test| TrainingSet {
                test,
                train: (0..n).filter(|&i| i != test).collect(),
            })
            .collect();
        tracing::debug!(registry = %self.name, folds = n, "computed training sets");
        &self.training_sets
    }

    pub fn training_sets(&self) -> &[TrainingSet] {
        &self.training_sets
    }

    /// The fold whose held-out dataset is `test`.
    pub fn training_set(&self, test: DatasetId) -> Option<&TrainingSet> {
        self.training_sets.iter().find(|ts| ts.test == test)
    }

    /// Close every interface. All interfaces are closed even when some
    /// fail; the first error is returned.
    pub fn close_all(&mut self) -> DataResult<()> {
        self.training_sets.clear();
        let mut first_error = None;
        for dsi in self.dsi.drain(..) {
            let description = dsi.describe();
            if let Err(err) = dsi.close() {
                tracing::warn!(dataset = %description, error = %err, "failed to close dataset");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for DataRegistry {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}
