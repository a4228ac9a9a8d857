//! Executor result types.

use serde::Serialize;
use stepweave_types::{RunStatus, StepStatus};

use crate::ledger::ExecutionLedger;

/// Per-step summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub step_index: usize,
    pub tool_name: String,
    pub status: StepStatus,
    /// Invocation attempts; zero when the step never reached the tool.
    pub attempts: u32,
    pub duration_ms: u64,
    /// Last failure or skip reason.
    pub reason: Option<String>,
}

/// Everything a finished run leaves behind.
///
/// The ledger is complete in every case, including halted and cancelled runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRunReport {
    pub status: RunStatus,
    pub ledger: ExecutionLedger,
    pub outcomes: Vec<StepOutcome>,
}

impl PlanRunReport {
    pub fn outcome(&self, step_id: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|outcome| outcome.step_id == step_id)
    }

    pub fn summary(&self) -> StepStatusSummary {
        summarize_step_statuses(&self.outcomes)
    }
}

/// Step counts by final status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepStatusSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub(crate) fn summarize_step_statuses(outcomes: &[StepOutcome]) -> StepStatusSummary {
    let mut summary = StepStatusSummary::default();
    for outcome in outcomes {
        match outcome.status {
            StepStatus::Succeeded => summary.succeeded += 1,
            StepStatus::Failed => summary.failed += 1,
            StepStatus::Skipped => summary.skipped += 1,
        }
    }
    summary
}
