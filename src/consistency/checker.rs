//! The post-export pass. Works on the document alone (plus, optionally, the
//! reference table and the artifact texts that were written) and collects
//! every finding instead of stopping at the first.

use super::report::{ConsistencyReport, IssueKind};
use crate::export::{ExportDocument, FieldSource, RenderedArtifacts};
use crate::store::ParamPath;
use crate::validation::{Classification, ReferenceTable};
use std::collections::BTreeMap;

pub struct ConsistencyChecker<'a> {
    doc: &'a ExportDocument,
    references: Option<&'a ReferenceTable>,
    artifacts: Option<(&'a RenderedArtifacts, &'a str)>,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(doc: &'a ExportDocument) -> Self {
        Self { doc, references: None, artifacts: None }
    }

    pub fn with_references(mut self, references: &'a ReferenceTable) -> Self {
        self.references = Some(references);
        self
    }

    /// Also compare `written` against a fresh render under `namespace`.
    pub fn with_artifacts(mut self, written: &'a RenderedArtifacts, namespace: &'a str) -> Self {
        self.artifacts = Some((written, namespace));
        self
    }

    pub fn run(&self) -> ConsistencyReport {
        let mut report = ConsistencyReport::new();
        self.check_formulas(&mut report);
        self.check_fields(&mut report);
        self.check_validation(&mut report);
        self.check_references(&mut report);
        self.check_artifacts(&mut report);

        if !report.is_empty() {
            tracing::warn!(issues = report.len(), "consistency check failed");
        }
        report
    }

    fn has_param(&self, raw: &str) -> bool {
        ParamPath::parse(raw).is_ok_and(|p| self.doc.parameters.contains_key(&p))
    }

    fn check_formulas(&self, report: &mut ConsistencyReport) {
        let modules: BTreeMap<&str, bool> = self.doc.modules.iter().map(|m| (m.id.as_str(), m.stub)).collect();

        for (id, formula) in &self.doc.formulas {
            let refs = formula.input_params.iter().map(|p| ("inputParams", p)).chain(formula.output_params.iter().map(|p| ("outputParams", p)));
            for (side, path) in refs {
                if !self.has_param(path) {
                    report.push(IssueKind::DanglingParamRef, format!("formulas.{id}.{side}"), format!("'{path}' is not an exported parameter"));
                }
            }

            let Some(module) = formula.simulation_file.as_deref() else { continue };
            let location = format!("formulas.{id}.simulationFile");
            match modules.get(module).copied() {
                None => report.push(IssueKind::UnknownSimulationFile, location, format!("no registered module '{module}'")),
                Some(true) => report.push(
                    IssueKind::SimulationFileNoOutput,
                    location,
                    format!("module '{module}' was replaced by its stub fallback and never ran"),
                ),
                Some(false) if formula.output_params.is_empty() => {
                    report.push(IssueKind::SimulationFileNoOutput, location, format!("formula names module '{module}' but declares no outputs"))
                }
                Some(false) if !self.wrote_any(module, &formula.output_params) => report.push(
                    IssueKind::SimulationFileNoOutput,
                    location,
                    format!("module '{module}' wrote none of {}", formula.output_params.join(", ")),
                ),
                Some(false) => {}
            }
        }
    }

    fn wrote_any(&self, module: &str, outputs: &[String]) -> bool {
        outputs
            .iter()
            .filter_map(|p| ParamPath::parse(p.as_str()).ok())
            .filter_map(|p| self.doc.parameters.get(&p))
            .any(|p| p.produced_by.as_deref() == Some(module))
    }

    fn check_fields(&self, report: &mut ConsistencyReport) {
        for (id, field) in &self.doc.fields {
            let FieldSource::Parameter { path } = &field.source else { continue };
            if field.structural {
                report.push(
                    IssueKind::StructuralFieldFromParameter,
                    format!("fields.{id}"),
                    format!("structural label is sourced from parameter '{path}'"),
                );
            } else if !self.has_param(path) {
                report.push(IssueKind::DanglingFieldRef, format!("fields.{id}"), format!("'{path}' is not an exported parameter"));
            }
        }
    }

    fn check_validation(&self, report: &mut ConsistencyReport) {
        for (path, record) in &self.doc.validation {
            let kind = match record.classification {
                Classification::SuspectUnitError => IssueKind::SuspectUnitError,
                Classification::UnitMismatch => IssueKind::UnitMismatch,
                _ => continue,
            };
            let detail = match (&record.computed, &record.reference, &record.reference_unit) {
                (Some(c), Some(r), Some(ru)) => format!("computed {c} {} vs reference {r} {ru}", record.unit),
                _ => record.classification.to_string(),
            };
            report.push(kind, format!("validation.{path}"), detail);
        }
    }

    fn check_references(&self, report: &mut ConsistencyReport) {
        let Some(references) = self.references else { return };
        for (path, _) in references.iter() {
            if !self.doc.parameters.contains_key(path) {
                report.push(IssueKind::OrphanReference, format!("references.{path}"), "no parameter with this path was produced");
            }
        }
    }

    fn check_artifacts(&self, report: &mut ConsistencyReport) {
        let Some((written, namespace)) = self.artifacts else { return };
        match RenderedArtifacts::render(self.doc, namespace) {
            Ok(fresh) => {
                if fresh.json != written.json {
                    report.push(IssueKind::ArtifactDrift, "artifacts.json", "written JSON differs from the document");
                }
                if fresh.js != written.js {
                    report.push(IssueKind::ArtifactDrift, "artifacts.js", "generated module differs from the document");
                }
            }
            Err(e) => report.push(IssueKind::ArtifactDrift, "artifacts", format!("document no longer renders: {e}")),
        }
    }
}
