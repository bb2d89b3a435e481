//! Consistency report types.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A formula references a path that is not in `parameters`.
    DanglingParamRef,
    /// A formula names a simulation module that is not registered.
    UnknownSimulationFile,
    /// The named module wrote none of the formula's outputs.
    SimulationFileNoOutput,
    /// A structural label is sourced from a parameter value.
    StructuralFieldFromParameter,
    /// A display field points at a path that is not in `parameters`.
    DanglingFieldRef,
    SuspectUnitError,
    UnitMismatch,
    /// Reference data for a path the run never produced.
    OrphanReference,
    /// A written artifact differs from a fresh render of the document.
    ArtifactDrift,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::DanglingParamRef => "dangling_param_ref",
            IssueKind::UnknownSimulationFile => "unknown_simulation_file",
            IssueKind::SimulationFileNoOutput => "simulation_file_no_output",
            IssueKind::StructuralFieldFromParameter => "structural_field_from_parameter",
            IssueKind::DanglingFieldRef => "dangling_field_ref",
            IssueKind::SuspectUnitError => "suspect_unit_error",
            IssueKind::UnitMismatch => "unit_mismatch",
            IssueKind::OrphanReference => "orphan_reference",
            IssueKind::ArtifactDrift => "artifact_drift",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One `(kind, location, detail)` finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub kind: IssueKind,
    pub location: String,
    pub detail: String,
}

/// All findings of one check. An empty report means the export is publishable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, kind: IssueKind, location: impl Into<String>, detail: impl Into<String>) {
        self.issues.push(ConsistencyIssue { kind, location: location.into(), detail: detail.into() });
    }

    pub fn is_empty(&self) -> bool { self.issues.is_empty() }
    pub fn len(&self) -> usize { self.issues.len() }

    pub fn iter(&self) -> impl Iterator<Item = &ConsistencyIssue> {
        self.issues.iter()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &ConsistencyIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "consistency: ok");
        }
        writeln!(f, "consistency: {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            writeln!(f, "  [{}] {}: {}", issue.kind, issue.location, issue.detail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_serialize_snake_case() {
        let json = serde_json::to_string(&IssueKind::StructuralFieldFromParameter).unwrap();
        assert_eq!(json, "\"structural_field_from_parameter\"");
        assert_eq!(IssueKind::ArtifactDrift.to_string(), "artifact_drift");
    }

    #[test]
    fn test_report_counts_and_display() {
        let mut report = ConsistencyReport::new();
        assert!(report.is_empty());
        report.push(IssueKind::DanglingParamRef, "formulas.n-gen", "topology.chi_eff_typo");
        report.push(IssueKind::OrphanReference, "references.higgs.m_w", "no such parameter");
        assert_eq!(report.len(), 2);
        assert_eq!(report.count(IssueKind::DanglingParamRef), 1);
        let text = report.to_string();
        assert!(text.contains("[dangling_param_ref] formulas.n-gen: topology.chi_eff_typo"));
    }
}
