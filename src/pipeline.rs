//! pipeline.rs
//! The orchestrator: seeds a fresh registry, resolves the execution order,
//! runs every module, validates, exports, and checks the export.

use crate::analysis::topology::{self, ExecutionPlan};
use crate::compute::{Engine, ModuleDescriptor, SimulationModule, StubFallback};
use crate::config::{ExportConfig, PipelineConfig};
use crate::consistency::{ConsistencyChecker, ConsistencyReport};
use crate::error::PipelineError;
use crate::export::{writer, DisplayField, ExportError, DocumentMeta, ExportDocument, FormulaDefinition, RenderedArtifacts};
use crate::graph::DependencyGraph;
use crate::store::{ParamEntry, ParamPath, Registry, RegistryError, RegistrySnapshot};
use crate::validation::{ReferenceTable, ValidationRecord, Validator};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Pre-seeded inputs of one run, in seeding order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseInputs(IndexMap<ParamPath, ParamEntry>);

impl BaseInputs {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, path: &str, entry: ParamEntry) -> Result<Self, PipelineError> {
        self.insert(path, entry)?;
        Ok(self)
    }

    /// Adds or replaces an input. Non-finite numbers are rejected here, so
    /// they never reach a module.
    pub fn insert(&mut self, path: &str, entry: ParamEntry) -> Result<(), PipelineError> {
        let path = ParamPath::parse(path)?;
        if !entry.value.is_finite() {
            return Err(PipelineError::NonFiniteInput { path });
        }
        self.0.insert(path, entry);
        Ok(())
    }

    pub fn paths(&self) -> BTreeSet<ParamPath> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// `self` with every entry of `overrides` applied on top.
    pub fn overridden_by(&self, overrides: &BaseInputs) -> BaseInputs {
        let mut merged = self.clone();
        for (path, entry) in &overrides.0 {
            merged.0.insert(path.clone(), entry.clone());
        }
        merged
    }

    fn seed_into(&self, registry: &mut Registry) -> Result<(), RegistryError> {
        for (path, entry) in &self.0 {
            registry.seed(path.clone(), entry.clone())?;
        }
        tracing::debug!(count = self.0.len(), "registry seeded");
        Ok(())
    }
}

enum Registration {
    Module(Box<dyn SimulationModule>),
    Stub(StubFallback),
}

impl Registration {
    fn descriptor(&self) -> &ModuleDescriptor {
        match self {
            Registration::Module(m) => m.descriptor(),
            Registration::Stub(s) => &s.descriptor,
        }
    }

    fn is_stub(&self) -> bool { matches!(self, Registration::Stub(_)) }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub plan: ExecutionPlan,
    pub snapshot: RegistrySnapshot,
    pub records: Vec<ValidationRecord>,
    pub document: ExportDocument,
    pub artifacts: RenderedArtifacts,
    pub report: ConsistencyReport,
}

impl RunOutcome {
    /// True only when the consistency report is empty.
    pub fn is_publishable(&self) -> bool { self.report.is_empty() }

    /// Writes the configured artifacts, reads them back and re-checks them
    /// for drift. Refuses to write anything for an inconsistent run.
    pub fn publish(&self, export: &ExportConfig) -> Result<Vec<PathBuf>, PipelineError> {
        if !self.is_publishable() {
            return Err(PipelineError::Inconsistent(self.report.clone()));
        }

        let mut written = Vec::new();
        let mut on_disk = self.artifacts.clone();
        if let Some(path) = &export.json_path {
            writer::write_atomic(path, &self.artifacts.json)?;
            on_disk.json = read_back(path)?;
            written.push(path.clone());
        }
        if let Some(path) = &export.js_path {
            writer::write_atomic(path, &self.artifacts.js)?;
            on_disk.js = read_back(path)?;
            written.push(path.clone());
        }

        let report = ConsistencyChecker::new(&self.document).with_artifacts(&on_disk, &export.namespace).run();
        if !report.is_empty() {
            return Err(PipelineError::Inconsistent(report));
        }
        Ok(written)
    }
}

fn check_fallback_shape(module: &ModuleDescriptor, fallback: &ModuleDescriptor) -> Result<(), PipelineError> {
    let mismatch = |detail: String| PipelineError::FallbackMismatch { module: fallback.id.clone(), detail };
    if module.id != fallback.id {
        return Err(mismatch(format!("module is registered as '{}'", module.id)));
    }
    let reads = |d: &ModuleDescriptor| d.reads.iter().cloned().collect::<BTreeSet<_>>();
    if reads(module) != reads(fallback) {
        return Err(mismatch(format!("reads {:?}, fallback declares {:?}", reads(module), reads(fallback))));
    }
    let writes = |d: &ModuleDescriptor| d.writes.iter().map(|w| (w.path.to_string(), w.unit.to_string())).collect::<BTreeSet<_>>();
    if writes(module) != writes(fallback) {
        return Err(mismatch(format!("writes {:?}, fallback declares {:?}", writes(module), writes(fallback))));
    }
    Ok(())
}

fn read_back(path: &Path) -> Result<String, PipelineError> {
    std::fs::read_to_string(path).map_err(|source| ExportError::Io { path: path.to_path_buf(), source }.into())
}

/// A constructed registration list plus everything a run needs.
///
/// Modules run in an order derived only from this list, never from
/// discovery. The pipeline itself is immutable during a run, so several runs
/// can share it.
pub struct Pipeline {
    config: PipelineConfig,
    base: BaseInputs,
    registrations: Vec<Registration>,
    references: ReferenceTable,
    formulas: Vec<FormulaDefinition>,
    fields: Vec<DisplayField>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            base: BaseInputs::new(),
            registrations: Vec::new(),
            references: ReferenceTable::new(),
            formulas: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    pub fn seed(&mut self, path: &str, entry: ParamEntry) -> Result<&mut Self, PipelineError> {
        self.base.insert(path, entry)?;
        Ok(self)
    }

    pub fn register(&mut self, module: impl SimulationModule + 'static) -> &mut Self {
        self.registrations.push(Registration::Module(Box::new(module)));
        self
    }

    /// Registers a module that may be missing. Without it, `fallback` is
    /// committed in its place with category `STUB`.
    ///
    /// The module must declare the same id, reads and writes (path and unit)
    /// as the fallback's descriptor, so the resolved graph does not depend on
    /// which of the two is loaded.
    pub fn register_optional(
        &mut self,
        module: Option<Box<dyn SimulationModule>>,
        fallback: StubFallback,
    ) -> Result<&mut Self, PipelineError> {
        match module {
            Some(module) => {
                check_fallback_shape(module.descriptor(), &fallback.descriptor)?;
                self.registrations.push(Registration::Module(module));
            }
            None => self.registrations.push(Registration::Stub(fallback)),
        }
        Ok(self)
    }

    pub fn references(&mut self, references: ReferenceTable) -> &mut Self {
        self.references = references;
        self
    }

    pub fn formula(&mut self, formula: FormulaDefinition) -> &mut Self {
        self.formulas.push(formula);
        self
    }

    pub fn field(&mut self, field: DisplayField) -> &mut Self {
        self.fields.push(field);
        self
    }

    fn descriptors(&self) -> Vec<&ModuleDescriptor> {
        self.registrations.iter().map(Registration::descriptor).collect()
    }

    /// The bipartite dependency graph of the registered modules.
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::build(self.descriptors())
    }

    /// Resolves the execution order without running anything.
    pub fn plan(&self) -> Result<ExecutionPlan, PipelineError> {
        Ok(topology::resolve(&self.descriptors(), &self.base.paths())?)
    }

    pub fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.run_with(&self.base)
    }

    /// One isolated run per scenario, each with its own fresh registry and
    /// the scenario's inputs applied over the pipeline's base inputs.
    /// Scenarios run in parallel; modules within a run never do.
    pub fn run_scenarios(&self, scenarios: &[BaseInputs]) -> Vec<Result<RunOutcome, PipelineError>> {
        scenarios.par_iter().map(|overrides| self.run_with(&self.base.overridden_by(overrides))).collect()
    }

    fn run_with(&self, base: &BaseInputs) -> Result<RunOutcome, PipelineError> {
        let descriptors = self.descriptors();
        let plan = topology::resolve(&descriptors, &base.paths())?;
        tracing::info!(modules = plan.len(), order = ?plan.ids, "resolved execution plan");

        let mut registry = Registry::new();
        base.seed_into(&mut registry)?;
        for &idx in &plan.order {
            match &self.registrations[idx] {
                Registration::Module(module) => Engine::execute(module.as_ref(), &mut registry)?,
                Registration::Stub(stub) => Engine::apply_stub(stub, &mut registry)?,
            };
        }

        let snapshot = registry.all();
        let records = Validator::new(&self.references, self.config.validation).validate(&snapshot);

        let meta = DocumentMeta { version: self.config.version.clone(), generated_at: self.config.timestamp() };
        let modules: Vec<(&ModuleDescriptor, bool)> =
            self.registrations.iter().map(|r| (r.descriptor(), r.is_stub())).collect();
        let document = ExportDocument::build(meta, &snapshot, &records, &self.formulas, &self.fields, &plan, &modules);

        let namespace = self.config.export.namespace.as_str();
        let artifacts = RenderedArtifacts::render(&document, namespace)?;
        let report = ConsistencyChecker::new(&document)
            .with_references(&self.references)
            .with_artifacts(&artifacts, namespace)
            .run();

        tracing::info!(
            parameters = snapshot.len(),
            anomalies = records.iter().filter(|r| r.classification.is_anomaly()).count(),
            issues = report.len(),
            "run complete"
        );
        Ok(RunOutcome { plan, snapshot, records, document, artifacts, report })
    }
}
