//! The validator: compares every computed parameter against its reference
//! and classifies the result. Validation never fails the run; anomalies are
//! recorded and logged.
use super::record::{Classification, ValidationRecord};
use super::reference::ReferenceTable;
use super::rules::{deviation, units, Verdict};
use crate::store::{Parameter, RegistrySnapshot};
use serde::{Deserialize, Serialize};

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Below this many sigma a value counts as `EXACT`.
    pub exact_sigma: f64,
    /// Up to this many sigma a value counts as `WITHIN_1SIGMA`.
    pub within_sigma: f64,
    /// Largest tolerated `|log10(computed / reference)|` before the value is
    /// reported as a suspected unit error.
    pub suspect_log10_ratio: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { exact_sigma: 0.01, within_sigma: 1.0, suspect_log10_ratio: 6.0 }
    }
}

pub struct Validator<'a> {
    references: &'a ReferenceTable,
    config: ValidationConfig,
}

impl<'a> Validator<'a> {
    pub fn new(references: &'a ReferenceTable, config: ValidationConfig) -> Self {
        Self { references, config }
    }

    /// One record per registry parameter, in path order.
    pub fn validate(&self, snapshot: &RegistrySnapshot) -> Vec<ValidationRecord> {
        let records: Vec<ValidationRecord> = snapshot.iter().map(|param| self.validate_one(param)).collect();
        for record in records.iter().filter(|r| r.classification.is_anomaly()) {
            tracing::warn!(
                path = %record.path,
                classification = %record.classification,
                computed = ?record.computed,
                reference = ?record.reference,
                deviation = ?record.deviation,
                "validation anomaly"
            );
        }
        records
    }

    pub fn validate_one(&self, param: &Parameter) -> ValidationRecord {
        let computed = param.value.as_f64();
        let mut record = ValidationRecord::unreferenced(param.path.clone(), computed, param.unit.clone());
        let Some(reference) = self.references.get(&param.path) else {
            return record;
        };

        record.reference = Some(reference.value);
        record.reference_unit = Some(reference.unit.clone());
        record.uncertainty = reference.uncertainty;
        record.tolerance_percent = reference.tolerance_percent;
        record.citation = (!reference.citation.is_empty()).then(|| reference.citation.clone());

        let verdict = match computed {
            None => Verdict { classification: Classification::NonNumeric, deviation: None, kind: None },
            Some(value) => units::check_units(&param.unit, &reference.unit)
                .or_else(|| units::check_magnitude(value, reference.value, self.config.suspect_log10_ratio))
                .unwrap_or_else(|| deviation::score(value, reference, &self.config)),
        };
        record.classification = verdict.classification;
        record.deviation = verdict.deviation;
        record.deviation_kind = verdict.kind;
        record
    }
}
