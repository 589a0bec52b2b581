//! Configuration module for probrem.
//!
//! Handles the settings file, environment variables, and dataset wiring.

mod settings;

pub use settings::{
    expand_env_vars, DatasetSettings, GenerationSettings, LearningSettings, Settings,
    SettingsError,
};
