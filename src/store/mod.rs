//! The parameter store: typed values plus provenance for one run.
pub mod error;
pub mod registry;
pub mod types;

pub use error::RegistryError;
pub use registry::{Registry, RegistrySnapshot};
pub use types::{Category, ModuleId, ParamEntry, ParamPath, ParamValue, Parameter, Provenance, Unit};
