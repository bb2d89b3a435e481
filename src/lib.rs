//! paramgraph_core: a write-once parameter registry and the dependency-ordered
//! simulation pipeline around it.
//!
//! A run seeds the registry with base inputs, orders the registered modules
//! so every read is produced before it is needed, executes them one by one
//! on views restricted to their declared reads, validates the results
//! against reference data, and exports one canonical document from which the
//! JSON file and the generated constants module are both rendered.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod consistency;
pub mod error;
pub mod export;
pub mod graph;
pub mod pipeline;
pub mod store;
pub mod validation;

pub use analysis::{ExecutionPlan, ResolveError};
pub use compute::{FnModule, ModuleDescriptor, ModuleError, ModuleOutputs, RegistryView, SimulationModule, StubFallback};
pub use config::{ConfigError, PipelineConfig};
pub use consistency::{ConsistencyReport, IssueKind};
pub use error::PipelineError;
pub use export::{DisplayField, ExportDocument, ExportError, FormulaDefinition, RenderedArtifacts};
pub use pipeline::{BaseInputs, Pipeline, RunOutcome};
pub use store::{Category, ParamEntry, ParamPath, ParamValue, Registry, RegistryError, Unit};
pub use validation::{Classification, ReferenceTable, ReferenceValue, ValidationRecord};
