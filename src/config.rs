//! Layered pipeline configuration.
//!
//! Sources, highest priority last:
//! 1. Built-in defaults
//! 2. `paramgraph.toml` in the working directory (or an explicit file)
//! 3. Environment variables prefixed `PARAMGRAPH_`, `__` separating sections
//!    (`PARAMGRAPH_EXPORT__NAMESPACE` -> `export.namespace`)

use crate::validation::ValidationConfig;
use chrono::{DateTime, Utc};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "paramgraph.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Global the generated module assigns itself to.
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js_path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { namespace: "PM".to_string(), json_path: None, js_path: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Written to `meta.version` of the exported document.
    pub version: String,
    /// Fixed export timestamp. When unset the wall clock is used, which makes
    /// two runs differ only in `meta.generated_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub validation: ValidationConfig,
    pub export: ExportConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: None,
            validation: ValidationConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, then `paramgraph.toml` if present, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Like [`PipelineConfig::load`] with an explicit file, which must exist.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file_exact(path))
            .merge(Env::prefixed("PARAMGRAPH_").split("__"));
        Self::from_figment(figment)
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            figment = figment.merge(Toml::file(local));
        }
        figment.merge(Env::prefixed("PARAMGRAPH_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.check()?;
        Ok(config)
    }

    /// The timestamp stamped into the exported document.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.generated_at.unwrap_or_else(Utc::now)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| ConfigError::InvalidValue { field: field.to_string(), reason: reason.to_string() };
        let v = &self.validation;
        if !(v.exact_sigma > 0.0 && v.exact_sigma <= v.within_sigma) {
            return Err(invalid("validation.exact_sigma", "must be positive and not above within_sigma"));
        }
        if !(v.suspect_log10_ratio > 0.0) {
            return Err(invalid("validation.suspect_log10_ratio", "must be positive"));
        }
        let ns = &self.export.namespace;
        let mut chars = ns.chars();
        let ident_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
        if !ident_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
            return Err(invalid("export.namespace", "must be a JavaScript identifier"));
        }
        Ok(())
    }
}
