//! Unit discipline: refuse cross-unit comparisons and catch order-of-magnitude slips.

use super::Verdict;
use crate::store::Unit;
use crate::validation::record::{Classification, DeviationKind};

/// "The Apples and Oranges Rule": computed and reference must carry the same
/// canonical unit. No conversion is attempted here; converting is the
/// producing module's job.
pub(crate) fn check_units(computed: &Unit, reference: &Unit) -> Option<Verdict> {
    if computed == reference {
        return None;
    }
    Some(Verdict { classification: Classification::UnitMismatch, deviation: None, kind: None })
}

/// Flags a computed/reference ratio whose decimal magnitude exceeds
/// `max_log10`. A 10^17 discrepancy is a unit error, not a physics result,
/// and must not be reported as a very large sigma.
pub(crate) fn check_magnitude(computed: f64, reference: f64, max_log10: f64) -> Option<Verdict> {
    if computed == 0.0 || reference == 0.0 {
        return None;
    }
    let log_ratio = (computed / reference).abs().log10();
    if log_ratio.abs() > max_log10 {
        return Some(Verdict {
            classification: Classification::SuspectUnitError,
            deviation: Some(log_ratio),
            kind: Some(DeviationKind::Log10Ratio),
        });
    }
    None
}
