//! Post-export cross-checks of the canonical document.
pub mod checker;
pub mod report;

pub use checker::ConsistencyChecker;
pub use report::{ConsistencyIssue, ConsistencyReport, IssueKind};
