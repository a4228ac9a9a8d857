//! Shared data model for stepweave: ledger records, plan documents, and run
//! lifecycle events.
//!
//! Everything here is plain serde data. Behavior (resolution, execution,
//! approval) lives in `stepweave-engine`.

pub mod events;
pub mod ledger;
pub mod plan;

pub use events::{ApprovalDecision, PlanRunEvent, RunStatus, StepStatus};
pub use ledger::{ExecutionResult, SKIPPED_FIELD};
pub use plan::{PlanDefinition, PlanStep, canonical_step_id, parse_step_number};
