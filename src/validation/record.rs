//! Defines the result types of the validation pass.
use crate::store::{ParamPath, Unit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing a computed value against its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "EXACT")]
    Exact,
    #[serde(rename = "WITHIN_1SIGMA")]
    Within1Sigma,
    #[serde(rename = "OUTSIDE_BOUNDS")]
    OutsideBounds,
    #[serde(rename = "NO_REFERENCE")]
    NoReference,
    /// Computed and reference differ by more orders of magnitude than any
    /// plausible model error; almost always a unit slip.
    #[serde(rename = "SUSPECT_UNIT_ERROR")]
    SuspectUnitError,
    /// Units differ, the comparison was refused.
    #[serde(rename = "UNIT_MISMATCH")]
    UnitMismatch,
    /// The computed value is not a number.
    #[serde(rename = "NON_NUMERIC")]
    NonNumeric,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Exact => "EXACT",
            Classification::Within1Sigma => "WITHIN_1SIGMA",
            Classification::OutsideBounds => "OUTSIDE_BOUNDS",
            Classification::NoReference => "NO_REFERENCE",
            Classification::SuspectUnitError => "SUSPECT_UNIT_ERROR",
            Classification::UnitMismatch => "UNIT_MISMATCH",
            Classification::NonNumeric => "NON_NUMERIC",
        }
    }

    /// Non-fatal to the run but must be surfaced.
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            Classification::OutsideBounds
                | Classification::SuspectUnitError
                | Classification::UnitMismatch
                | Classification::NonNumeric
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// What the `deviation` number measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    Sigma,
    Percent,
    /// `log10(|computed / reference|)`, reported for suspected unit errors.
    Log10Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub path: ParamPath,
    pub computed: Option<f64>,
    pub unit: Unit,
    pub reference: Option<f64>,
    pub reference_unit: Option<Unit>,
    pub uncertainty: Option<f64>,
    pub tolerance_percent: Option<f64>,
    pub deviation: Option<f64>,
    pub deviation_kind: Option<DeviationKind>,
    pub classification: Classification,
    pub citation: Option<String>,
}

impl ValidationRecord {
    pub(crate) fn unreferenced(path: ParamPath, computed: Option<f64>, unit: Unit) -> Self {
        Self {
            path,
            computed,
            unit,
            reference: None,
            reference_unit: None,
            uncertainty: None,
            tolerance_percent: None,
            deviation: None,
            deviation_kind: None,
            classification: Classification::NoReference,
            citation: None,
        }
    }
}
