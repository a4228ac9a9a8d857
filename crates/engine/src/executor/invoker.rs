//! Tool invocation seam.
//!
//! The executor treats every tool as an opaque async function from JSON
//! arguments to a JSON result. Hosts plug in their transport by implementing
//! [`ToolInvoker`]; the fixtures here back tests and the CLI.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

/// Marker object in fixture files that makes a call fail.
pub const FIXTURE_ERROR_KEY: &str = "$error";
/// Marker object in fixture files holding successive results.
pub const FIXTURE_SEQUENCE_KEY: &str = "$sequence";

/// Invokes a tool by name.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Executes `tool_name` with `args`.
    async fn invoke(&self, tool_name: &str, args: &Value) -> Result<Value, ToolError>;

    /// Whether a previous invocation is still in flight. The executor polls
    /// this before each invocation.
    fn is_busy(&self) -> bool {
        false
    }
}

/// Returns the error message when `value` is an `{"isError": true}` result.
///
/// The message is taken from the first text content block when present.
pub fn error_result_message(value: &Value) -> Option<String> {
    if value.get("isError").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let message = value
        .get("content")
        .and_then(|content| content.get(0))
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .unwrap_or("tool reported an error");
    Some(message.to_string())
}

/// Returns its arguments as the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoInvoker;

#[async_trait]
impl ToolInvoker for EchoInvoker {
    async fn invoke(&self, _tool_name: &str, args: &Value) -> Result<Value, ToolError> {
        Ok(args.clone())
    }
}

/// Serves canned results keyed by tool name.
///
/// A fixture value is returned as-is on every call, except for two marker
/// objects: `{"$error": "message"}` fails the call, and
/// `{"$sequence": [first, second, ...]}` returns the entries in turn, repeating
/// the last one. Markers may appear inside a sequence.
#[derive(Debug, Default)]
pub struct FixtureInvoker {
    fixtures: HashMap<String, Value>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FixtureInvoker {
    pub fn new(fixtures: HashMap<String, Value>) -> Self {
        Self {
            fixtures,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Builds fixtures from a JSON object of `tool name -> result`.
    pub fn from_json(document: &Value) -> Result<Self, ToolError> {
        let Value::Object(map) = document else {
            return Err(ToolError::invocation("fixtures", "fixture document must be a JSON object"));
        };
        Ok(Self::new(map.iter().map(|(tool, result)| (tool.clone(), result.clone())).collect()))
    }

    pub fn with_fixture(mut self, tool_name: impl Into<String>, result: Value) -> Self {
        self.fixtures.insert(tool_name.into(), result);
        self
    }

    /// Number of invocations seen for `tool_name`.
    pub fn calls(&self, tool_name: &str) -> usize {
        self.calls
            .lock()
            .expect("fixture call counter lock poisoned")
            .get(tool_name)
            .copied()
            .unwrap_or(0)
    }

    fn record_call(&self, tool_name: &str) -> usize {
        let mut calls = self.calls.lock().expect("fixture call counter lock poisoned");
        let count = calls.entry(tool_name.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

#[async_trait]
impl ToolInvoker for FixtureInvoker {
    async fn invoke(&self, tool_name: &str, _args: &Value) -> Result<Value, ToolError> {
        let call_number = self.record_call(tool_name);
        let fixture = self.fixtures.get(tool_name).ok_or_else(|| ToolError::unknown(tool_name))?;

        let selected = match fixture.get(FIXTURE_SEQUENCE_KEY).and_then(Value::as_array) {
            Some(sequence) if !sequence.is_empty() => &sequence[(call_number - 1).min(sequence.len() - 1)],
            _ => fixture,
        };
        if let Some(message) = selected.get(FIXTURE_ERROR_KEY) {
            let message = message.as_str().map(str::to_string).unwrap_or_else(|| message.to_string());
            return Err(ToolError::invocation(tool_name, message));
        }
        Ok(selected.clone())
    }
}
