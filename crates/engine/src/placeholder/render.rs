//! Splicing resolved values back into strings.

use serde_json::Value;

/// Outcome of resolving one string.
///
/// A string that is exactly one placeholder passes the referenced value
/// through untouched; anything else becomes a rendered string.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The value a sole placeholder referred to, in its own type.
    Native(Value),
    /// Text with every placeholder substituted.
    Rendered(String),
}

impl Resolved {
    pub fn into_value(self) -> Value {
        match self {
            Self::Native(value) => value,
            Self::Rendered(text) => Value::String(text),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

/// String form of a value substituted into surrounding text.
///
/// Strings are inserted as-is, numbers and booleans literally, `null` as an
/// empty string, and objects/arrays as indented JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
