//! Model loader for TOML model files.
//!
//! ```toml
//! name = "school"
//!
//! [[class]]
//! name = "Professor"
//! pk = ["prof_id"]
//!
//! [[attribute]]
//! class = "Professor"
//! name = "fame"
//! domain = [0, 1]
//! cpd = { table = [[0.2, 0.8]] }
//!
//! [[dependency]]
//! child = "Student.success"
//! parent = "Professor.fame"
//! slotchain = ["Student", "advisor", "Professor"]
//! joins = ["Student.student_id = advisor.student_id", "advisor.prof_id = Professor.prof_id"]
//! aggregator = "AVG"
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use probrem::model::loader::load_model;
//! use std::path::Path;
//!
//! let prm = load_model(Path::new("school.toml"))?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use super::prm::{Prm, PrmBuilder};
use super::types::{Attribute, ClassKind, ColumnRef, Dependency, ErClass, JoinPredicate};
use crate::cpd::{CpdError, CpdTabular};

static JOIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_]\w*)\.([A-Za-z_]\w*)\s*=\s*([A-Za-z_]\w*)\.([A-Za-z_]\w*)\s*$")
        .unwrap()
});

/// Errors that can occur when loading a model.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// IO error reading file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A join predicate that is not of the form `A.x = B.y`
    #[error("Invalid join '{join}' in dependency {dependency}")]
    InvalidJoin { dependency: String, join: String },

    /// Inline CPD rejected by the CPD constructor
    #[error("Invalid CPD for {attribute}: {source}")]
    InvalidCpd {
        attribute: String,
        #[source]
        source: CpdError,
    },

    /// Invalid field value
    #[error("Invalid value for '{field}' in {context}: {message}")]
    InvalidValue {
        field: String,
        context: String,
        message: String,
    },

    /// Model validation failed
    #[error("Model validation failed: {0}")]
    Validation(#[from] super::ModelError),
}

/// Result type for model loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelFile {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "class")]
    classes: Vec<ClassEntry>,
    #[serde(default, rename = "attribute")]
    attributes: Vec<AttributeEntry>,
    #[serde(default, rename = "dependency")]
    dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassEntry {
    name: String,
    pk: Vec<String>,
    #[serde(default)]
    kind: ClassKind,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttributeEntry {
    class: String,
    name: String,
    domain: Vec<i64>,
    cpd: Option<CpdEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CpdEntry {
    table: Option<Vec<Vec<f64>>>,
    file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DependencyEntry {
    child: String,
    parent: String,
    slotchain: Option<Vec<String>>,
    #[serde(default)]
    joins: Vec<String>,
    aggregator: Option<String>,
    parent_domain: Option<Vec<i64>>,
}

/// Load a model from a TOML file.
///
/// Relative CPD file paths are resolved against the model file's
/// directory.
pub fn load_model(path: &Path) -> LoadResult<Prm> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_model(&content, base)
}

/// Parse a model from TOML text (useful for testing).
pub fn parse_model(content: &str, base_dir: &Path) -> LoadResult<Prm> {
    let file: ModelFile = toml::from_str(content)?;
    let mut builder = PrmBuilder::new(file.name);

    for class in file.classes {
        builder = builder.class(ErClass {
            name: class.name,
            pk: class.pk,
            kind: class.kind,
        });
    }

    let mut inline = Vec::new();
    for entry in file.attributes {
        let attribute = Attribute::new(entry.class, entry.name, entry.domain);
        let qualified = attribute.qualified_name();
        match entry.cpd {
            Some(CpdEntry {
                table: Some(_),
                file: Some(_),
            }) => {
                return Err(LoadError::InvalidValue {
                    field: "cpd".into(),
                    context: qualified,
                    message: "set either 'table' or 'file', not both".into(),
                })
            }
            Some(CpdEntry {
                table: Some(table),
                file: None,
            }) => inline.push((qualified, attribute.domain.clone(), table)),
            Some(CpdEntry {
                table: None,
                file: Some(file),
            }) => builder = builder.cpd_file(qualified, resolve(base_dir, file)),
            Some(CpdEntry {
                table: None,
                file: None,
            })
            | None => {}
        }
        builder = builder.attribute(attribute);
    }

    for entry in file.dependencies {
        builder = builder.dependency(parse_dependency(entry)?);
    }

    // Inline tables are shaped by the dependencies, so they are attached
    // once the model is validated.
    let mut prm = builder.build()?;
    for (qualified, domain, table) in inline {
        let parent_domains = prm.parent_domains(&qualified)?;
        let cpd = CpdTabular::new(domain, parent_domains, table).map_err(|source| {
            LoadError::InvalidCpd {
                attribute: qualified.clone(),
                source,
            }
        })?;
        prm.set_cpd(&qualified, cpd)?;
    }

    Ok(prm)
}

fn parse_dependency(entry: DependencyEntry) -> LoadResult<Dependency> {
    let mut dependency = Dependency::new(entry.child, entry.parent);
    let name = dependency.name();

    dependency.slotchain = match entry.slotchain {
        Some(chain) => chain,
        None => {
            // Same-class dependencies may leave the slot-chain implicit.
            let child_class = class_of(&dependency.child);
            if child_class.is_some() && child_class == class_of(&dependency.parent) {
                child_class.into_iter().map(String::from).collect()
            } else {
                Vec::new()
            }
        }
    };

    for join in &entry.joins {
        dependency.joins.push(parse_join(join).ok_or_else(|| LoadError::InvalidJoin {
            dependency: name.clone(),
            join: join.clone(),
        })?);
    }

    dependency.aggregator = entry.aggregator;
    dependency.parent_domain = entry.parent_domain;
    Ok(dependency)
}

/// Parse a join predicate of the form `A.x = B.y`.
pub fn parse_join(s: &str) -> Option<JoinPredicate> {
    let caps = JOIN_PATTERN.captures(s)?;
    Some(JoinPredicate::new(
        ColumnRef::new(&caps[1], &caps[2]),
        ColumnRef::new(&caps[3], &caps[4]),
    ))
}

fn class_of(qualified: &str) -> Option<&str> {
    qualified.split_once('.').map(|(class, _)| class)
}

fn resolve(base_dir: &Path, file: PathBuf) -> PathBuf {
    if file.is_absolute() {
        file
    } else {
        base_dir.join(file)
    }
}
