//! # probrem
//!
//! Data-access layer for probabilistic relational models (PRMs) stored in
//! relational databases.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Model file (classes, attributes, dependencies)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [model::loader]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Prm (dependency graph, topological order, CPDs)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Attribute SELECT / UPDATE statements (sql builder)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!            ┌─────────────┴─────────────┐
//!            ▼ [generate]                ▼ [learn]
//! ┌───────────────────────┐   ┌───────────────────────────┐
//! │ sample + write values │   │ count + estimate CPDs     │
//! └───────────────────────┘   └───────────────────────────┘
//!            │                           │
//!            └─────────────┬─────────────┘
//!                          ▼ [data]
//! ┌─────────────────────────────────────────────────────────┐
//! │   DataRegistry of DataSetInterface connections (SQLite)  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod cpd;
pub mod data;
pub mod generate;
pub mod learn;
pub mod model;
pub mod planner;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::cpd::{CpdSampler, CpdTabular};
    pub use crate::data::{
        datasetinterface_factory, DataRegistry, DataSetInterface, DiType, SqliteInterface,
    };
    pub use crate::generate::{GenerateOptions, GenerationReport, Materializer};
    pub use crate::model::{
        load_model, Aggregator, Attribute, ColumnRef, Dependency, ErClass, Prm, PrmBuilder,
    };
    pub use crate::planner::{AttributePlanner, AttributeQuery};
    pub use crate::sql::{Dialect, SqlValue, Statement};
}

// Also export at crate root for convenience
pub use model::Prm;
pub use sql::Dialect;
