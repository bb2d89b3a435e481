//! Experimental reference data, loaded once before orchestration and
//! treated as read-only configuration for the rest of the run.

use crate::store::{ParamPath, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to read reference data from {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Malformed reference data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid reference for '{path}': {message}")]
    Invalid { path: ParamPath, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceValue {
    pub value: f64,
    pub unit: Unit,
    /// One-sigma uncertainty, same unit as `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<f64>,
    /// Accepted relative deviation in percent, used when no uncertainty is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_percent: Option<f64>,
    #[serde(default)]
    pub citation: String,
}

impl ReferenceValue {
    pub fn with_uncertainty(value: f64, uncertainty: f64, unit: &str, citation: &str) -> Self {
        Self { value, unit: Unit::new(unit), uncertainty: Some(uncertainty), tolerance_percent: None, citation: citation.to_string() }
    }

    pub fn with_tolerance(value: f64, tolerance_percent: f64, unit: &str, citation: &str) -> Self {
        Self { value, unit: Unit::new(unit), uncertainty: None, tolerance_percent: Some(tolerance_percent), citation: citation.to_string() }
    }

    fn check(&self, path: &ParamPath) -> Result<(), ReferenceError> {
        let invalid = |message: &str| ReferenceError::Invalid { path: path.clone(), message: message.to_string() };
        if !self.value.is_finite() {
            return Err(invalid("value is not finite"));
        }
        if self.unit.is_missing() {
            return Err(invalid("unit is missing; use \"1\" for dimensionless values"));
        }
        if self.uncertainty.is_some_and(|u| !u.is_finite() || u < 0.0) {
            return Err(invalid("uncertainty must be finite and non-negative"));
        }
        if self.tolerance_percent.is_some_and(|t| !t.is_finite() || t <= 0.0) {
            return Err(invalid("tolerance must be finite and positive"));
        }
        Ok(())
    }
}

/// `path -> reference` mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceTable(BTreeMap<ParamPath, ReferenceValue>);

impl ReferenceTable {
    pub fn new() -> Self { Self::default() }

    pub fn from_json_str(json: &str) -> Result<Self, ReferenceError> {
        let table: Self = serde_json::from_str(json)?;
        for (path, reference) in &table.0 {
            reference.check(path)?;
        }
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ReferenceError::Io { path: path.to_path_buf(), source })?;
        let table = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), count = table.len(), "loaded reference data");
        Ok(table)
    }

    pub fn insert(&mut self, path: ParamPath, reference: ReferenceValue) -> Result<(), ReferenceError> {
        reference.check(&path)?;
        self.0.insert(path, reference);
        Ok(())
    }

    pub fn get(&self, path: &ParamPath) -> Option<&ReferenceValue> { self.0.get(path) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamPath, &ReferenceValue)> {
        self.0.iter()
    }
}
