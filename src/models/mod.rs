pub mod impact;
pub mod outcome;
pub mod run;
pub mod violation;

pub use impact::{Impact, ImpactBreakdown, ImpactStyle, SarifLevel};
pub use outcome::{EvidenceRecord, ImageRef, OutcomeStatus, TestOutcome};
pub use run::{RunOptions, RunReport, RunStatus};
pub use violation::{RuleSummary, Violation, ViolationNode};
