//! Lifecycle events and status enums emitted while a plan runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Final status of a single step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step executed and returned successfully.
    Succeeded,
    /// Step attempted but could not produce a result.
    Failed,
    /// Step did not execute (condition, rejection, cancellation, timeout).
    Skipped,
}

/// Final status of a plan run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step succeeded or was skipped.
    Succeeded,
    /// At least one step failed and the run continued to the end.
    Failed,
    /// A step failed and the failure policy stopped the run.
    Halted,
    /// An external cancellation stopped the run.
    Cancelled,
}

/// Terminal state of an approval gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    Cancelled,
    TimedOut,
}

impl ApprovalDecision {
    /// True only for [`ApprovalDecision::Approved`].
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Events streamed to observers while a plan runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlanRunEvent {
    RunStarted {
        plan: Option<String>,
        step_count: usize,
        at: DateTime<Utc>,
    },
    StepStarted {
        step_id: String,
        step_index: usize,
        tool_name: String,
        attempt: u32,
        started_at: DateTime<Utc>,
    },
    ApprovalRequested {
        step_id: String,
        tool_name: String,
        args: Value,
    },
    ApprovalResolved {
        step_id: String,
        decision: ApprovalDecision,
    },
    StepFinished {
        step_id: String,
        status: StepStatus,
        attempts: u32,
        duration_ms: u64,
        reason: Option<String>,
    },
    RunCompleted {
        status: RunStatus,
        finished_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_event_tag() {
        let event = PlanRunEvent::ApprovalResolved {
            step_id: "step2".into(),
            decision: ApprovalDecision::TimedOut,
        };
        let encoded = serde_json::to_value(&event).expect("encode");
        assert_eq!(encoded["event"], "approval_resolved");
        assert_eq!(encoded["decision"], "timed_out");
    }
}
