//! Static analysis of the module set: execution ordering and unit algebra.
pub mod topology;
pub mod units;

pub use topology::{resolve, ExecutionPlan, ResolveError};
pub use units::{convert, ParsedUnit, UnitError};
