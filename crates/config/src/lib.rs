//! Configuration management for the chronicle backend
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, then `config/{env}`)
//! - Environment variables (`CHRONICLE_` prefix, `__` nesting separator)

pub mod settings;

pub use settings::{
    load_settings, InferenceConfig, ObservabilityConfig, PersistenceConfig, ServerConfig, Settings,
    SpeechConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
