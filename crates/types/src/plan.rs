//! Plan documents produced by the planning component.
//!
//! A plan is an ordered list of tool calls whose arguments may reference
//! earlier steps through `{{step<N>...}}` placeholders. The model mirrors the
//! authoring shape: step order is significant and arguments are kept verbatim
//! until execution time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered multi-step plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanDefinition {
    /// Optional plan name used in logs and events.
    #[serde(default)]
    pub plan: Option<String>,
    /// Optional descriptive copy.
    #[serde(default)]
    pub description: Option<String>,
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

/// A single planned tool call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    /// Explicit identifier. `step<N>` pins the step index to `N - 1`; when
    /// absent the identifier is derived from the step's position.
    #[serde(default)]
    pub id: Option<String>,
    /// Tool to invoke.
    pub tool: String,
    /// Raw arguments: structured JSON, or text that may or may not be JSON.
    #[serde(default)]
    pub args: Value,
    /// Forces an approval gate before invocation.
    #[serde(default)]
    pub requires_confirmation: bool,
    /// Optional condition; the step only runs when it resolves truthy.
    #[serde(default)]
    pub when: Option<String>,
    /// Optional human-readable label.
    #[serde(default)]
    pub description: Option<String>,
}

/// Builds the canonical identifier for the 1-based step number `number`.
pub fn canonical_step_id(number: usize) -> String {
    format!("step{number}")
}

/// Extracts `N` from an identifier of the exact form `step<N>`.
pub fn parse_step_number(step_id: &str) -> Option<usize> {
    let digits = step_id.strip_prefix("step")?;
    if digits.is_empty() || !digits.chars().all(|character| character.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
