//! Validation of computed parameters against experimental references.
pub mod record;
pub mod reference;
pub(crate) mod rules;
pub mod validator;

pub use record::{Classification, DeviationKind, ValidationRecord};
pub use reference::{ReferenceError, ReferenceTable, ReferenceValue};
pub use validator::{ValidationConfig, Validator};

use std::collections::BTreeMap;

/// Counts records per classification.
pub fn summarize(records: &[ValidationRecord]) -> BTreeMap<Classification, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.classification).or_insert(0) += 1;
    }
    counts
}
