//! The orchestrator's error type. Lower layers raise their own errors; this
//! is the only place they are translated into a run failure.
use crate::compute::ModuleError;
use crate::config::ConfigError;
use crate::consistency::ConsistencyReport;
use crate::export::ExportError;
use crate::analysis::topology::ResolveError;
use crate::store::{ModuleId, ParamPath, RegistryError};
use crate::validation::ReferenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("Module '{module}' failed: {source}")]
    ModuleExecution { module: ModuleId, source: ModuleError },
    #[error("Module '{module}' returned outputs that do not match its declared writes (missing: {missing:?}, unexpected: {unexpected:?})")]
    OutputMismatch { module: ModuleId, missing: Vec<String>, unexpected: Vec<String> },
    #[error("Module '{module}' produced a non-finite value for '{path}'")]
    NonFiniteOutput { module: ModuleId, path: ParamPath },
    #[error("Optional module '{module}' does not match its declared fallback: {detail}")]
    FallbackMismatch { module: ModuleId, detail: String },
    #[error("Base input '{path}' is not finite")]
    NonFiniteInput { path: ParamPath },
    #[error("Export is not publishable:\n{0}")]
    Inconsistent(ConsistencyReport),
}
