//! Turns a step's raw arguments into concrete tool-call arguments.

use serde_json::{Map, Value};
use stepweave_util::parse_repaired_json;
use tracing::{debug, warn};

use crate::error::{ContextSegment, NormalizationError};
use crate::ledger::ExecutionLedger;
use crate::placeholder::{PlaceholderResolver, contains_placeholder};

/// Resolves step input against the ledger of the current run.
#[derive(Debug, Clone, Copy)]
pub struct StepInputNormalizer<'a> {
    resolver: PlaceholderResolver<'a>,
}

impl<'a> StepInputNormalizer<'a> {
    pub fn new(ledger: &'a ExecutionLedger) -> Self {
        Self {
            resolver: PlaceholderResolver::new(ledger),
        }
    }

    /// Normalizes `raw` for `tool_name`.
    ///
    /// Text input is repaired and parsed as JSON first. Text that still is not
    /// JSON is passed through unchanged with a warning, unless it carries
    /// placeholders, in which case those are resolved in place. Structured
    /// input has every string leaf resolved; failures carry the key/index path
    /// to the offending leaf.
    pub fn normalize(&self, raw: &Value, tool_name: &str) -> Result<Value, NormalizationError> {
        let Value::String(text) = raw else {
            return self.resolve_node(raw, tool_name);
        };

        match parse_repaired_json(text) {
            Ok(parsed) => self.resolve_node(&parsed, tool_name),
            Err(_) if contains_placeholder(text) => {
                debug!(tool = %tool_name, "step input is templated text; resolving placeholders in place");
                self.resolve_node(raw, tool_name)
            }
            Err(error) => {
                warn!(tool = %tool_name, %error, "step input is not JSON; passing text through unchanged");
                Ok(raw.clone())
            }
        }
    }

    fn resolve_node(&self, value: &Value, tool_name: &str) -> Result<Value, NormalizationError> {
        match value {
            Value::String(text) => self
                .resolver
                .resolve_str(text)
                .map(|resolved| resolved.into_value())
                .map_err(|source| NormalizationError::at_leaf(tool_name, source)),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    self.resolve_node(item, tool_name)
                        .map_err(|error| error.within(ContextSegment::Index(index)))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (key, nested) in map {
                    let value = self
                        .resolve_node(nested, tool_name)
                        .map_err(|error| error.within(ContextSegment::Key(key.clone())))?;
                    resolved.insert(key.clone(), value);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Convenience wrapper around [`StepInputNormalizer::normalize`].
pub fn normalize_step_input(raw: &Value, tool_name: &str, ledger: &ExecutionLedger) -> Result<Value, NormalizationError> {
    StepInputNormalizer::new(ledger).normalize(raw, tool_name)
}
