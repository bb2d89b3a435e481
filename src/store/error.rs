use super::types::{ModuleId, ParamPath};
use thiserror::Error;

fn writer(who: &Option<ModuleId>) -> &str {
    who.as_deref().unwrap_or("<base input>")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Invalid parameter path '{path}'")]
    InvalidPath { path: String },
    #[error("Parameter '{path}' has no unit; use \"1\" for dimensionless values")]
    MissingUnit { path: ParamPath },
    #[error("Parameter '{path}' is not known to the registry")]
    UnknownParameter { path: ParamPath },
    #[error("Parameter '{path}' was already written by {}; refusing write from {}", writer(.existing), writer(.attempted))]
    DuplicateWrite { path: ParamPath, existing: Option<ModuleId>, attempted: Option<ModuleId> },
    #[error("Module '{module}' rewrote '{path}' with a different value or provenance")]
    ConflictingRewrite { path: ParamPath, module: ModuleId },
}
