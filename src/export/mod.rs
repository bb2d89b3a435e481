//! Canonical export: one in-memory document, and the artifacts rendered from it.
pub mod document;
pub mod js;
pub mod json;
pub mod writer;

pub use document::{DisplayField, DocumentMeta, ExportDocument, ExportedFormula, ExportedParameter, FieldSource, FormulaDefinition, ModuleRecord};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Group '{group}' collides with a reserved accessor in the generated module")]
    ReservedGroup { group: String },
    #[error("Parameter '{path}' cannot be exposed under that name in the generated module")]
    ReservedName { path: String },
    #[error("Failed to write artifact {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

/// Both artifacts, rendered from the same document in the same call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifacts {
    pub json: String,
    pub js: String,
}

impl RenderedArtifacts {
    pub fn render(doc: &ExportDocument, namespace: &str) -> Result<Self, ExportError> {
        Ok(Self { json: json::render(doc)?, js: js::render(doc, namespace)? })
    }
}
