//! The unit of computation: a module declares what it reads and what it
//! writes, and computes its outputs from a view restricted to its reads.

use crate::analysis::units::{self, UnitError};
use crate::store::{Category, ModuleId, ParamEntry, ParamPath, ParamValue, Parameter, Registry, RegistryError, Unit};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised from inside a module's `run`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModuleError {
    #[error("Module '{module}' read '{path}' which is not in its declared reads")]
    UndeclaredRead { module: ModuleId, path: String },
    #[error("Declared input '{path}' has not been written")]
    MissingInput { path: String },
    #[error("Input '{path}' is {found}, expected {expected}")]
    TypeMismatch { path: String, expected: &'static str, found: &'static str },
    #[error("Domain error: {0}")]
    Domain(String),
    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl ModuleError {
    pub fn domain(msg: impl Into<String>) -> Self { ModuleError::Domain(msg.into()) }
}

/// One declared output: where it goes and the provenance it is committed with.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    pub path: ParamPath,
    pub unit: Unit,
    pub category: Category,
    pub source: String,
}

/// The static shape of a module: id, declared reads, declared writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    pub reads: SmallVec<[ParamPath; 4]>,
    pub writes: SmallVec<[OutputDecl; 4]>,
}

impl ModuleDescriptor {
    pub fn builder(id: impl Into<ModuleId>) -> DescriptorBuilder {
        DescriptorBuilder { id: id.into(), reads: Vec::new(), writes: Vec::new() }
    }

    pub fn reads_path(&self, path: &str) -> bool {
        self.reads.iter().any(|p| p.as_str() == path)
    }

    pub fn write_decl(&self, path: &str) -> Option<&OutputDecl> {
        self.writes.iter().find(|w| w.path.as_str() == path)
    }
}

/// Collects raw path strings and validates them all in [`DescriptorBuilder::build`].
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    id: ModuleId,
    reads: Vec<String>,
    writes: Vec<(String, Unit, Category, String)>,
}

impl DescriptorBuilder {
    pub fn read(mut self, path: &str) -> Self {
        self.reads.push(path.to_string());
        self
    }

    pub fn reads<'s>(mut self, paths: impl IntoIterator<Item = &'s str>) -> Self {
        self.reads.extend(paths.into_iter().map(str::to_string));
        self
    }

    pub fn write(mut self, path: &str, unit: &str, category: Category, source: &str) -> Self {
        self.writes.push((path.to_string(), Unit::new(unit), category, source.to_string()));
        self
    }

    pub fn build(self) -> Result<ModuleDescriptor, RegistryError> {
        let reads = self.reads.into_iter().map(ParamPath::parse).collect::<Result<SmallVec<_>, _>>()?;
        let writes = self
            .writes
            .into_iter()
            .map(|(path, unit, category, source)| {
                let path = ParamPath::parse(path)?;
                if unit.is_missing() {
                    return Err(RegistryError::MissingUnit { path });
                }
                Ok(OutputDecl { path, unit, category, source })
            })
            .collect::<Result<SmallVec<_>, RegistryError>>()?;
        Ok(ModuleDescriptor { id: self.id, reads, writes })
    }
}

/// Values a module proposes, keyed by path. The orchestrator checks the key
/// set against the declared writes before anything is committed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleOutputs(BTreeMap<String, ParamValue>);

impl ModuleOutputs {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, path: &str, value: impl Into<ParamValue>) -> Self {
        self.set(path, value);
        self
    }

    pub fn set(&mut self, path: &str, value: impl Into<ParamValue>) {
        self.0.insert(path.to_string(), value.into());
    }

    pub fn get(&self, path: &str) -> Option<&ParamValue> { self.0.get(path) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, ParamValue> { self.0 }
}

/// A simulation module. Constructed once, run once per pipeline run.
pub trait SimulationModule: Send + Sync {
    fn descriptor(&self) -> &ModuleDescriptor;

    fn run(&self, inputs: &RegistryView<'_>) -> Result<ModuleOutputs, ModuleError>;

    fn id(&self) -> &str { &self.descriptor().id }
}

/// Adapts a closure into a [`SimulationModule`].
pub struct FnModule<F> {
    descriptor: ModuleDescriptor,
    run: F,
}

impl<F> FnModule<F>
where
    F: Fn(&RegistryView<'_>) -> Result<ModuleOutputs, ModuleError> + Send + Sync,
{
    pub fn new(descriptor: ModuleDescriptor, run: F) -> Self {
        Self { descriptor, run }
    }
}

impl<F> SimulationModule for FnModule<F>
where
    F: Fn(&RegistryView<'_>) -> Result<ModuleOutputs, ModuleError> + Send + Sync,
{
    fn descriptor(&self) -> &ModuleDescriptor { &self.descriptor }

    fn run(&self, inputs: &RegistryView<'_>) -> Result<ModuleOutputs, ModuleError> {
        (self.run)(inputs)
    }
}

/// Declared stand-in values for an optional module that is not available.
#[derive(Debug, Clone, PartialEq)]
pub struct StubFallback {
    pub descriptor: ModuleDescriptor,
    pub values: ModuleOutputs,
    pub reason: String,
}

impl StubFallback {
    pub fn new(descriptor: ModuleDescriptor, values: ModuleOutputs, reason: impl Into<String>) -> Self {
        Self { descriptor, values, reason: reason.into() }
    }

    /// The entry committed for one stubbed output: declared unit, `STUB` category.
    pub fn entry(&self, decl: &OutputDecl, value: ParamValue) -> ParamEntry {
        ParamEntry {
            value,
            unit: decl.unit.clone(),
            category: Category::Stub,
            source: format!("stub fallback ({}): {}", self.reason, decl.source),
        }
    }
}

/// Read-only registry access restricted to a module's declared reads.
pub struct RegistryView<'a> {
    registry: &'a Registry,
    descriptor: &'a ModuleDescriptor,
}

impl<'a> RegistryView<'a> {
    pub fn new(registry: &'a Registry, descriptor: &'a ModuleDescriptor) -> Self {
        Self { registry, descriptor }
    }

    pub fn module(&self) -> &str { &self.descriptor.id }

    /// The full stored parameter. Fails immediately on an undeclared read.
    pub fn param(&self, path: &str) -> Result<&'a Parameter, ModuleError> {
        let Some(declared) = self.descriptor.reads.iter().find(|p| p.as_str() == path) else {
            return Err(ModuleError::UndeclaredRead { module: self.descriptor.id.clone(), path: path.to_string() });
        };
        self.registry
            .get(declared)
            .map_err(|_| ModuleError::MissingInput { path: path.to_string() })
    }

    pub fn get(&self, path: &str) -> Result<&'a ParamValue, ModuleError> {
        self.param(path).map(|p| &p.value)
    }

    pub fn f64(&self, path: &str) -> Result<f64, ModuleError> {
        let value = self.get(path)?;
        value.as_f64().ok_or(ModuleError::TypeMismatch { path: path.to_string(), expected: "number", found: value.kind() })
    }

    /// Reads a number and converts it explicitly into `unit`.
    pub fn f64_in(&self, path: &str, unit: &str) -> Result<f64, ModuleError> {
        let param = self.param(path)?;
        let value = param
            .value
            .as_f64()
            .ok_or(ModuleError::TypeMismatch { path: path.to_string(), expected: "number", found: param.value.kind() })?;
        Ok(units::convert(value, &param.unit, &Unit::new(unit))?)
    }

    pub fn text(&self, path: &str) -> Result<&'a str, ModuleError> {
        match self.get(path)? {
            ParamValue::Text(s) => Ok(s),
            other => Err(ModuleError::TypeMismatch { path: path.to_string(), expected: "string", found: other.kind() }),
        }
    }
}
