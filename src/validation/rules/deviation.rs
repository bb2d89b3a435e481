//! Deviation scoring against a reference: sigma when an uncertainty is
//! known, percent error against a tolerance otherwise.

use super::Verdict;
use crate::validation::record::{Classification, DeviationKind};
use crate::validation::reference::ReferenceValue;
use crate::validation::validator::ValidationConfig;

/// Relative difference below which an unbounded reference counts as matched.
const EXACT_RELATIVE: f64 = 1e-10;

pub(crate) fn score(computed: f64, reference: &ReferenceValue, config: &ValidationConfig) -> Verdict {
    let diff = (computed - reference.value).abs();

    if let Some(sigma_unit) = reference.uncertainty.filter(|u| *u != 0.0) {
        let sigma = diff / sigma_unit;
        return Verdict { classification: classify(sigma, config), deviation: Some(sigma), kind: Some(DeviationKind::Sigma) };
    }

    if let Some(tolerance) = reference.tolerance_percent {
        if reference.value == 0.0 {
            let classification = if computed == 0.0 { Classification::Exact } else { Classification::OutsideBounds };
            return Verdict { classification, deviation: None, kind: None };
        }
        let percent = diff / reference.value.abs() * 100.0;
        return Verdict {
            classification: classify(percent / tolerance, config),
            deviation: Some(percent),
            kind: Some(DeviationKind::Percent),
        };
    }

    // No bound at all: only an exact match is acceptable.
    let scale = reference.value.abs().max(f64::MIN_POSITIVE);
    let classification = if diff / scale <= EXACT_RELATIVE { Classification::Exact } else { Classification::OutsideBounds };
    let deviation = (reference.value != 0.0).then(|| diff / reference.value.abs() * 100.0);
    Verdict { classification, deviation, kind: deviation.map(|_| DeviationKind::Percent) }
}

/// `normalized` is deviation in units of the allowed band (sigma, or percent / tolerance).
fn classify(normalized: f64, config: &ValidationConfig) -> Classification {
    if normalized < config.exact_sigma {
        Classification::Exact
    } else if normalized <= config.within_sigma {
        Classification::Within1Sigma
    } else {
        Classification::OutsideBounds
    }
}
