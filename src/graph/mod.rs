//! Defines the dependency graph between parameters and modules.
pub mod dag;

// Re-export key types for convenient access
pub use dag::{DepEdge, DepNode, DependencyGraph};
