//! TOML-based configuration for probrem.
//!
//! Supports a config file (probrem.toml) with environment variable
//! expansion in paths.
//!
//! Example configuration:
//! ```toml
//! name = "school"
//! model = "models/school.toml"
//! di_type = "CrossValidation"
//! dialect = "sqlite"
//!
//! [[datasets]]
//! path = "${DATA_DIR}/school_1.db"
//! backend = "SQLite"
//!
//! [[datasets]]
//! path = "${DATA_DIR}/school_2.db"
//!
//! [generation]
//! seed = 42
//! cpd_dir = "./localdistributions"
//! generate_missing_cpds = true
//!
//! [learning]
//! pseudo_count = 1.0
//! ```

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{datasetinterface_factory, DataError, DataRegistry, DiType};
use crate::sql::{Dialect, UnknownDialect};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error(transparent)]
    UnsupportedDialect(#[from] UnknownDialect),

    #[error("Failed to open dataset {path}: {source}")]
    Dataset {
        path: PathBuf,
        #[source]
        source: DataError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Name of the data interface (registry).
    pub name: String,

    /// Model file (supports ${ENV_VAR} expansion).
    pub model: Option<String>,

    /// How the datasets are used.
    pub di_type: DiType,

    /// SQL dialect of the datasets.
    pub dialect: String,

    /// Datasets, in registration order.
    pub datasets: Vec<DatasetSettings>,

    pub generation: GenerationSettings,

    pub learning: LearningSettings,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "prm".to_string(),
            model: None,
            di_type: DiType::default(),
            dialect: "sqlite".to_string(),
            datasets: Vec::new(),
            generation: GenerationSettings::default(),
            learning: LearningSettings::default(),
            base_dir: None,
        }
    }
}

/// One dataset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSettings {
    /// Database file (supports ${ENV_VAR} expansion).
    pub path: String,

    /// Backend name: SQLite, MySQL or XML.
    #[serde(default = "default_backend")]
    pub backend: String,
}

fn default_backend() -> String {
    "SQLite".to_string()
}

/// Dataset generation settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSettings {
    /// Seed of the sampling RNG. Drawn from entropy when absent.
    pub seed: Option<u64>,

    /// Resume from this attribute (qualified name).
    pub start_from: Option<String>,

    /// Where generated CPDs are saved.
    pub cpd_dir: Option<String>,

    /// Create random CPDs for attributes that have none.
    pub generate_missing_cpds: bool,
}

/// CPD learning settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LearningSettings {
    /// Added to every count before normalizing.
    pub pseudo_count: f64,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self { pseudo_count: 1.0 }
    }
}

impl Settings {
    /// Load settings from a TOML file. Relative paths in the file are
    /// resolved against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.base_dir = path.parent().map(Path::to_path_buf);
        Ok(settings)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        if !settings.learning.pseudo_count.is_finite() || settings.learning.pseudo_count < 0.0 {
            return Err(SettingsError::InvalidConfig(format!(
                "learning.pseudo_count must be a non-negative number, got {}",
                settings.learning.pseudo_count
            )));
        }
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `PROBREM_CONFIG`
    /// 2. `./probrem.toml`
    /// 3. `~/.config/probrem/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("PROBREM_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("probrem.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("probrem").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    pub fn dialect(&self) -> Result<Dialect, SettingsError> {
        Ok(self.dialect.parse::<Dialect>()?)
    }

    /// The model file, expanded and resolved.
    pub fn model_path(&self) -> Result<PathBuf, SettingsError> {
        let model = self
            .model
            .as_deref()
            .ok_or_else(|| SettingsError::InvalidConfig("no model file configured".into()))?;
        self.resolve_path(model)
    }

    /// The CPD directory, expanded and resolved.
    pub fn cpd_dir(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.generation
            .cpd_dir
            .as_deref()
            .map(|dir| self.resolve_path(dir))
            .transpose()
    }

    /// Expand environment variables in `raw` and resolve a relative result
    /// against the config file's directory.
    pub fn resolve_path(&self, raw: &str) -> Result<PathBuf, SettingsError> {
        let path = PathBuf::from(expand_env_vars(raw)?);
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        })
    }

    /// Open every configured dataset through the backend factory and
    /// register them in declaration order.
    pub fn open_registry(&self) -> Result<DataRegistry, SettingsError> {
        let mut registry = DataRegistry::new(&self.name, self.di_type);
        for dataset in &self.datasets {
            let path = self.resolve_path(&dataset.path)?;
            let dsi = datasetinterface_factory(&path, &dataset.backend)
                .map_err(|source| SettingsError::Dataset { path, source })?;
            registry.register(dsi);
        }
        Ok(registry)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
