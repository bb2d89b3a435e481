//! Simulation modules and the engine that runs them.
pub mod engine;
pub mod module;

pub use engine::Engine;
pub use module::{
    DescriptorBuilder, FnModule, ModuleDescriptor, ModuleError, ModuleOutputs, OutputDecl, RegistryView, SimulationModule,
    StubFallback,
};
