//! `when` conditions on plan steps.

use serde_json::Value;

use crate::error::ResolutionError;
use crate::placeholder::PlaceholderResolver;

/// Truthiness of a resolved condition value.
///
/// `false`, `null`, `0`, empty strings, `"false"`, `"0"`, and empty
/// arrays/objects are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => {
            let trimmed = text.trim();
            !(trimmed.is_empty() || trimmed.eq_ignore_ascii_case("false") || trimmed == "0")
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Resolves `expression` against the ledger and reports whether the step should run.
pub fn evaluate_condition(expression: &str, resolver: &PlaceholderResolver<'_>) -> Result<bool, ResolutionError> {
    let resolved = resolver.resolve_str(expression)?.into_value();
    Ok(is_truthy(&resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ExecutionLedger;
    use serde_json::json;
    use stepweave_types::ExecutionResult;

    #[test]
    fn falsy_values() {
        for value in [json!(false), json!(null), json!(0), json!(0.0), json!(""), json!("false"), json!("0"), json!([]), json!({})] {
            assert!(!is_truthy(&value), "{value} should be falsy");
        }
    }

    #[test]
    fn truthy_values() {
        for value in [json!(true), json!(1), json!(-2.5), json!("yes"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&value), "{value} should be truthy");
        }
    }

    #[test]
    fn evaluates_placeholders_against_ledger() {
        let mut ledger = ExecutionLedger::new();
        ledger.append(ExecutionResult::succeeded("step1", 0, "search", json!({}), json!({"found": 0, "hits": [1]})));
        let resolver = PlaceholderResolver::new(&ledger);

        assert_eq!(evaluate_condition("{{step1.found}}", &resolver), Ok(false));
        assert_eq!(evaluate_condition("{{step1.hits}}", &resolver), Ok(true));
        assert_eq!(evaluate_condition("true", &resolver), Ok(true));
        assert!(evaluate_condition("{{step2.found}}", &resolver).is_err());
    }
}
