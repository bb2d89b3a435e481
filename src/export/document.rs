//! document.rs
//! The canonical export document. Every artifact is a pure function of this
//! structure; nothing downstream reads the registry again.

use crate::analysis::topology::ExecutionPlan;
use crate::compute::ModuleDescriptor;
use crate::store::{Category, ModuleId, ParamPath, ParamValue, RegistrySnapshot, Unit};
use crate::validation::ValidationRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub version: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedParameter {
    pub value: ParamValue,
    pub category: Category,
    pub source: String,
    pub unit: Unit,
    pub produced_by: Option<ModuleId>,
    pub written_at: u64,
}

/// A formula as the display layer knows it. Paths are kept as raw strings:
/// catching references that do not resolve is the consistency checker's job.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaDefinition {
    pub id: String,
    pub expression: String,
    pub category: Category,
    pub input_param_refs: Vec<String>,
    pub output_param_refs: Vec<String>,
    pub simulation_file: Option<String>,
}

impl FormulaDefinition {
    pub fn new(id: impl Into<String>, expression: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
            category,
            input_param_refs: Vec::new(),
            output_param_refs: Vec::new(),
            simulation_file: None,
        }
    }

    pub fn inputs<'s>(mut self, paths: impl IntoIterator<Item = &'s str>) -> Self {
        self.input_param_refs.extend(paths.into_iter().map(str::to_string));
        self
    }

    pub fn outputs<'s>(mut self, paths: impl IntoIterator<Item = &'s str>) -> Self {
        self.output_param_refs.extend(paths.into_iter().map(str::to_string));
        self
    }

    pub fn simulation_file(mut self, module: impl Into<String>) -> Self {
        self.simulation_file = Some(module.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFormula {
    pub expression: String,
    pub category: Category,
    pub input_params: Vec<String>,
    pub output_params: Vec<String>,
    pub simulation_file: Option<String>,
}

impl From<&FormulaDefinition> for ExportedFormula {
    fn from(f: &FormulaDefinition) -> Self {
        Self {
            expression: f.expression.clone(),
            category: f.category,
            input_params: f.input_param_refs.clone(),
            output_params: f.output_param_refs.clone(),
            simulation_file: f.simulation_file.clone(),
        }
    }
}

/// Where a display field takes its text from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSource {
    Literal { value: String },
    Parameter { path: String },
}

/// A value shown by the display layer. Structural fields (section and
/// equation numbers) must be literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayField {
    pub id: String,
    pub structural: bool,
    pub source: FieldSource,
}

impl DisplayField {
    pub fn literal(id: impl Into<String>, structural: bool, value: impl Into<String>) -> Self {
        Self { id: id.into(), structural, source: FieldSource::Literal { value: value.into() } }
    }

    pub fn parameter(id: impl Into<String>, structural: bool, path: impl Into<String>) -> Self {
        Self { id: id.into(), structural, source: FieldSource::Parameter { path: path.into() } }
    }
}

/// One executed module, in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub reads: Vec<ParamPath>,
    pub writes: Vec<ParamPath>,
    pub stub: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub meta: DocumentMeta,
    pub parameters: BTreeMap<ParamPath, ExportedParameter>,
    pub validation: BTreeMap<ParamPath, ValidationRecord>,
    pub formulas: BTreeMap<String, ExportedFormula>,
    #[serde(default)]
    pub fields: BTreeMap<String, DisplayField>,
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
}

impl ExportDocument {
    /// Assembles the document from the final run state.
    ///
    /// `modules` pairs each descriptor with its stub flag and must be in
    /// registration order; `plan` decides the order they are listed in.
    pub fn build(
        meta: DocumentMeta,
        snapshot: &RegistrySnapshot,
        records: &[ValidationRecord],
        formulas: &[FormulaDefinition],
        fields: &[DisplayField],
        plan: &ExecutionPlan,
        modules: &[(&ModuleDescriptor, bool)],
    ) -> Self {
        let parameters = snapshot
            .iter()
            .map(|p| {
                let exported = ExportedParameter {
                    value: p.value.clone(),
                    category: p.category,
                    source: p.source.clone(),
                    unit: p.unit.clone(),
                    produced_by: p.produced_by.clone(),
                    written_at: p.written_at,
                };
                (p.path.clone(), exported)
            })
            .collect();

        let validation = records.iter().map(|r| (r.path.clone(), r.clone())).collect();
        let formulas = formulas.iter().map(|f| (f.id.clone(), ExportedFormula::from(f))).collect();
        let fields = fields.iter().map(|f| (f.id.clone(), f.clone())).collect();

        let modules = plan
            .order
            .iter()
            .filter_map(|&idx| modules.get(idx))
            .map(|(desc, stub)| ModuleRecord {
                id: desc.id.clone(),
                reads: desc.reads.to_vec(),
                writes: desc.writes.iter().map(|w| w.path.clone()).collect(),
                stub: *stub,
            })
            .collect();

        Self { meta, parameters, validation, formulas, fields, modules }
    }

    pub fn parameter(&self, path: &str) -> Option<&ExportedParameter> {
        let path = ParamPath::parse(path).ok()?;
        self.parameters.get(&path)
    }

    /// Parameters grouped by the first path segment, both levels sorted.
    pub fn groups(&self) -> BTreeMap<&str, Vec<(&str, &ExportedParameter)>> {
        let mut groups: BTreeMap<&str, Vec<(&str, &ExportedParameter)>> = BTreeMap::new();
        for (path, param) in &self.parameters {
            groups.entry(path.group()).or_default().push((path.name(), param));
        }
        groups
    }
}
