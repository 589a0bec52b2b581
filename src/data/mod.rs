//! Dataset access.
//!
//! A dataset is one relational skeleton stored in a database. Every
//! backend is reached through the [`DataSetInterface`] capability trait;
//! [`datasetinterface_factory`] picks the implementation by backend name,
//! and [`DataRegistry`] owns the open interfaces of a run.

mod registry;
mod sqlite;

pub use registry::{DataRegistry, DatasetId, DiType, TrainingSet, UnknownDiType};
pub use sqlite::SqliteInterface;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::sql::{SqlValue, Statement};

/// Errors raised by dataset interfaces.
#[derive(Debug, Error)]
pub enum DataError {
    /// Backend name not recognised. No connection was attempted.
    #[error("Unknown data interface backend: {0}")]
    UnknownBackend(String),

    /// Recognised backend without an implementation.
    #[error("Data interface backend {0} is not implemented")]
    NotImplemented(Backend),

    /// A statement failed to prepare or execute.
    #[error("Failed to execute `{statement}`: {source}")]
    Execution {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Dataset {0} is closed")]
    Closed(String),
}

pub type DataResult<T> = Result<T, DataError>;

/// Database backends a dataset can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Sqlite,
    MySql,
    Xml,
}

impl FromStr for Backend {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "mysql" => Ok(Backend::MySql),
            "xml" => Ok(Backend::Xml),
            _ => Err(DataError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Sqlite => "SQLite",
            Backend::MySql => "MySQL",
            Backend::Xml => "XML",
        })
    }
}

/// One open connection to one dataset.
///
/// Statements carry their parameters; implementations bind them and never
/// splice values into SQL text. Transactions are explicit: `begin` opens a
/// deferred transaction that must end in `commit` or `rollback`.
pub trait DataSetInterface: fmt::Debug {
    fn backend(&self) -> Backend;

    /// Human readable identification of the dataset, for logs.
    fn describe(&self) -> String;

    /// Run a SELECT and buffer every row.
    fn execute_query(&self, statement: &Statement) -> DataResult<Vec<Vec<SqlValue>>>;

    /// Run a data-modifying statement. Returns the number of changed rows.
    fn execute_update(&mut self, statement: &Statement) -> DataResult<usize>;

    fn begin(&mut self) -> DataResult<()>;

    fn commit(&mut self) -> DataResult<()>;

    fn rollback(&mut self) -> DataResult<()>;

    /// Whether a transaction is open.
    fn in_transaction(&self) -> bool;

    /// Close the connection. An open transaction is rolled back.
    fn close(self: Box<Self>) -> DataResult<()>;
}

/// Open a dataset interface for `path` with the named backend.
///
/// Backend names are matched case-insensitively (`SQLite`, `MySQL`,
/// `XML`).
pub fn datasetinterface_factory(
    path: impl AsRef<Path>,
    backend: &str,
) -> DataResult<Box<dyn DataSetInterface>> {
    match backend.parse::<Backend>()? {
        Backend::Sqlite => Ok(Box::new(SqliteInterface::open(path.as_ref())?)),
        other => Err(DataError::NotImplemented(other)),
    }
}
