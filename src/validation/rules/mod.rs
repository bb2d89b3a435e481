pub(crate) mod deviation;
pub(crate) mod units;

use super::record::{Classification, DeviationKind};

/// What a rule concluded about one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Verdict {
    pub classification: Classification,
    pub deviation: Option<f64>,
    pub kind: Option<DeviationKind>,
}
