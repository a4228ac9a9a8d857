//! The execution ledger record.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Field inside `tool_result` marking a planned step that never executed.
pub const SKIPPED_FIELD: &str = "skipped";

/// Record of one completed or attempted plan step.
///
/// Records are created once per attempt and never edited afterwards; a retried
/// step produces a second record with the same `step_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Stable identifier, canonically `step<N>`.
    pub step_id: String,
    /// Zero-based plan position. Monotonic across the ledger, not necessarily contiguous.
    pub step_index: usize,
    /// Tool that was (or would have been) invoked.
    pub tool_name: String,
    /// Resolved arguments actually sent to the tool.
    #[serde(default)]
    pub tool_args: Value,
    /// Raw tool output. Absent when the step failed before the tool answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    /// Outcome flag; `None` for skipped steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Free-text explanation. Never machine-parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExecutionResult {
    /// Record for a tool call that returned normally.
    pub fn succeeded(step_id: impl Into<String>, step_index: usize, tool_name: impl Into<String>, tool_args: Value, tool_result: Value) -> Self {
        Self {
            step_id: step_id.into(),
            step_index,
            tool_name: tool_name.into(),
            tool_args,
            tool_result: Some(tool_result),
            success: Some(true),
            reason: None,
        }
    }

    /// Record for an attempt that failed; `tool_result` carries any partial output.
    pub fn failed(
        step_id: impl Into<String>,
        step_index: usize,
        tool_name: impl Into<String>,
        tool_args: Value,
        tool_result: Option<Value>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            step_index,
            tool_name: tool_name.into(),
            tool_args,
            tool_result,
            success: Some(false),
            reason: Some(reason.into()),
        }
    }

    /// Record for a planned step that did not execute.
    ///
    /// The skip marker is embedded in `tool_result` as `{"skipped": true, "reason": ...}`.
    pub fn skipped(step_id: impl Into<String>, step_index: usize, tool_name: impl Into<String>, tool_args: Value, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut marker = JsonMap::new();
        marker.insert(SKIPPED_FIELD.to_string(), Value::Bool(true));
        marker.insert("reason".to_string(), Value::String(reason.clone()));
        Self {
            step_id: step_id.into(),
            step_index,
            tool_name: tool_name.into(),
            tool_args,
            tool_result: Some(Value::Object(marker)),
            success: None,
            reason: Some(reason),
        }
    }

    /// True when `tool_result` carries `skipped: true`.
    pub fn is_skipped(&self) -> bool {
        self.tool_result
            .as_ref()
            .and_then(|result| result.get(SKIPPED_FIELD))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// True only for an explicit `success: true`.
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }
}
