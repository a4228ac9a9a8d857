//! Evaluation of placeholders against an [`ExecutionLedger`].
//!
//! Lookups run through a fixed precedence of fallbacks: `.result` unwrapping,
//! string-encoded JSON, `content[0].text` envelopes, an over-qualified
//! `result.` prefix, the `content` fallbacks, the field-alias table, and
//! finally the step's own arguments. The order is observable and must not be
//! rearranged.

use serde_json::{Map, Value};
use tracing::debug;

use super::render::{Resolved, stringify_value};
use super::{PlaceholderExpr, PlaceholderMatch, ResultSource, scan_placeholders};
use crate::error::ResolutionError;
use crate::field_paths::available_field_paths;
use crate::ledger::ExecutionLedger;
use crate::path::{get as get_path, last_key_segment};

/// Tried in order when a `content` lookup misses.
const CONTENT_FALLBACKS: [&str; 3] = ["raw_content", "results[0].raw_content", "results[0].content"];

/// Interchangeable names for the last segment of a path.
const FIELD_ALIAS_GROUPS: &[&[&str]] = &[
    &["link", "href", "url"],
    &["content", "text", "body", "raw_content"],
    &["title", "name", "heading"],
];

/// Resolves placeholders in step arguments. Reads the ledger, never writes it.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderResolver<'a> {
    ledger: &'a ExecutionLedger,
}

impl<'a> PlaceholderResolver<'a> {
    pub fn new(ledger: &'a ExecutionLedger) -> Self {
        Self { ledger }
    }

    /// Resolves every placeholder inside `input`.
    ///
    /// Objects keep their key order, arrays their length and order; numbers,
    /// booleans and `null` come back unchanged.
    pub fn resolve(&self, input: &Value) -> Result<Value, ResolutionError> {
        match input {
            Value::String(text) => Ok(self.resolve_str(text)?.into_value()),
            Value::Array(items) => items.iter().map(|item| self.resolve(item)).collect::<Result<Vec<_>, _>>().map(Value::Array),
            Value::Object(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (key, value) in map {
                    resolved.insert(key.clone(), self.resolve(value)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolves the placeholders in one string.
    ///
    /// A string that is a single placeholder (after trimming) yields
    /// [`Resolved::Native`]. Otherwise each match is stringified and
    /// substituted left to right. Any failing match fails the whole string.
    pub fn resolve_str(&self, input: &str) -> Result<Resolved, ResolutionError> {
        let matches = scan_placeholders(input);
        if matches.is_empty() {
            return Ok(Resolved::Rendered(input.to_string()));
        }
        if let [single] = matches.as_slice()
            && single.text == input.trim()
        {
            return self.resolve_match(single).map(Resolved::Native);
        }

        let mut rendered = String::with_capacity(input.len());
        let mut cursor = 0;
        for placeholder in &matches {
            rendered.push_str(&input[cursor..placeholder.range.start]);
            let value = self.resolve_match(placeholder)?;
            rendered.push_str(&stringify_value(&value));
            cursor = placeholder.range.end;
        }
        rendered.push_str(&input[cursor..]);
        Ok(Resolved::Rendered(rendered))
    }

    fn resolve_match(&self, placeholder: &PlaceholderMatch) -> Result<Value, ResolutionError> {
        self.resolve_expression(&placeholder.expr, &placeholder.text)
    }

    /// Resolves a single parsed expression. `text` is the original placeholder
    /// text reported in errors.
    pub fn resolve_expression(&self, expr: &PlaceholderExpr, text: &str) -> Result<Value, ResolutionError> {
        let entry = self
            .ledger
            .find_by_step(expr.step())
            .map_err(|source| ResolutionError::StepResultNotFound {
                placeholder: text.to_string(),
                source,
            })?;

        let unwrapped = entry.tool_result.as_ref().map(unwrap_tool_result);
        let found = match expr {
            PlaceholderExpr::ExplicitSource {
                source: ResultSource::ToolResult,
                path,
                ..
            } => entry
                .tool_result
                .as_ref()
                .map(parse_json_string)
                .and_then(|raw| navigate(&raw, path.as_deref())),
            _ => unwrapped.as_ref().and_then(|value| lookup_output(value, expr.path())),
        };
        if let Some(value) = found {
            return Ok(value);
        }

        if let Some(value) = navigate(&entry.tool_args, expr.path()) {
            debug!(placeholder = %text, step_id = %entry.step_id, "placeholder resolved from tool arguments");
            return Ok(value);
        }

        Err(ResolutionError::PlaceholderNotFound {
            placeholder: text.to_string(),
            step: expr.step(),
            tool_name: entry.tool_name.clone(),
            available_fields: unwrapped.as_ref().map(available_field_paths).unwrap_or_default(),
        })
    }
}

/// Takes `.result` when present, decodes string-encoded JSON, and opens a
/// `content[0]` text envelope whose text parses as JSON.
pub fn unwrap_tool_result(raw: &Value) -> Value {
    let base = raw.get("result").unwrap_or(raw);
    let mut value = parse_json_string(base);
    if let Some(text) = text_envelope(&value)
        && let Ok(parsed) = serde_json::from_str::<Value>(text)
    {
        value = parsed;
    }
    value
}

fn parse_json_string(value: &Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn text_envelope(value: &Value) -> Option<&str> {
    let first = value.get("content")?.get(0)?;
    if first.get("type")?.as_str()? != "text" {
        return None;
    }
    first.get("text")?.as_str()
}

fn navigate(value: &Value, path: Option<&str>) -> Option<Value> {
    match path {
        Some(path) => get_path(value, path).cloned(),
        None => Some(value.clone()),
    }
}

fn lookup_output(value: &Value, path: Option<&str>) -> Option<Value> {
    let Some(path) = path else {
        return Some(value.clone());
    };
    let effective = match path.strip_prefix("result.") {
        Some(rest) if value.get("result").is_none() => rest,
        _ => path,
    };
    if let Some(found) = get_path(value, effective) {
        return Some(found.clone());
    }
    if effective == "content"
        && let Some(found) = CONTENT_FALLBACKS.iter().find_map(|fallback| get_path(value, fallback))
    {
        return Some(found.clone());
    }
    alias_lookup(value, effective)
}

fn alias_lookup(value: &Value, path: &str) -> Option<Value> {
    let (segment, range) = last_key_segment(path)?;
    let group = FIELD_ALIAS_GROUPS.iter().find(|group| group.iter().any(|alias| *alias == segment))?;
    group.iter().filter(|alias| **alias != segment).find_map(|alias| {
        let candidate = format!("{}{alias}{}", &path[..range.start], &path[range.end..]);
        let found = get_path(value, &candidate)?;
        debug!(path, alias = %alias, "field resolved through alias");
        Some(found.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerLookupError;
    use serde_json::json;
    use stepweave_types::ExecutionResult;

    fn ledger_with(results: Vec<Value>) -> ExecutionLedger {
        let mut ledger = ExecutionLedger::new();
        for (index, result) in results.into_iter().enumerate() {
            ledger.append(ExecutionResult::succeeded(format!("step{}", index + 1), index, "tool", json!({}), result));
        }
        ledger
    }

    #[test]
    fn input_without_placeholders_is_identity() {
        let ledger = ExecutionLedger::new();
        let resolver = PlaceholderResolver::new(&ledger);
        let input = json!({"z": 1, "a": ["x", null, true, {"n": "{not a placeholder}"}], "s": "plain"});
        assert_eq!(resolver.resolve(&input).expect("resolves"), input);
    }

    #[test]
    fn single_placeholder_keeps_native_type() {
        let ledger = ledger_with(vec![json!({"a": 1})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1}}")).expect("resolves"), json!({"a": 1}));
        assert_eq!(resolver.resolve(&json!("  {{step1.a}} ")).expect("resolves"), json!(1));
    }

    #[test]
    fn embedded_placeholder_is_stringified() {
        let ledger = ledger_with(vec![json!({"value": 42})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("Result: {{step1.value}}")).expect("resolves"), json!("Result: 42"));
    }

    #[test]
    fn multiple_placeholders_render_left_to_right() {
        let ledger = ledger_with(vec![json!({"a": "x", "b": null, "c": [1]})]);
        let resolver = PlaceholderResolver::new(&ledger);
        let rendered = resolver.resolve_str("{{step1.a}}|{{step1.b}}|{{step1.c}}").expect("resolves");
        assert_eq!(rendered, Resolved::Rendered("x||[\n  1\n]".into()));
    }

    #[test]
    fn unwraps_result_field_and_string_json() {
        let ledger = ledger_with(vec![json!({"result": "{\"items\": [{\"id\": 7}]}"})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.items[0].id}}")).expect("resolves"), json!(7));
    }

    #[test]
    fn unwraps_text_content_envelope() {
        let ledger = ledger_with(vec![json!({"content": [{"type": "text", "text": "{\"title\": \"Doc\"}"}]})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.output.title}}")).expect("resolves"), json!("Doc"));
    }

    #[test]
    fn strips_over_qualified_result_prefix() {
        let ledger = ledger_with(vec![json!({"count": 3})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.output.result.count}}")).expect("resolves"), json!(3));
        assert_eq!(resolver.resolve(&json!("{{step1.result.count}}")).expect("resolves"), json!(3));
    }

    #[test]
    fn keeps_result_prefix_when_nested_result_exists() {
        let ledger = ledger_with(vec![json!({"result": {"result": {"count": 5}}})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.output.result.count}}")).expect("resolves"), json!(5));
    }

    #[test]
    fn content_falls_back_to_search_shapes() {
        let ledger = ledger_with(vec![json!({"results": [{"raw_content": "page body"}]})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.content}}")).expect("resolves"), json!("page body"));
    }

    #[test]
    fn alias_table_maps_link_to_href() {
        let ledger = ledger_with(vec![json!({"href": "http://x"})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.link}}")).expect("resolves"), json!("http://x"));
    }

    #[test]
    fn alias_applies_to_last_segment_only() {
        let ledger = ledger_with(vec![json!({"results": [{"url": "u0"}, {"url": "u1"}]})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.results[1].link}}")).expect("resolves"), json!("u1"));
        assert_eq!(resolver.resolve(&json!("{{step1.results[0].heading}}")).ok(), None);
    }

    #[test]
    fn tool_result_source_skips_result_unwrapping() {
        let ledger = ledger_with(vec![json!({"result": {"a": 1}, "status": "ok"})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.tool_result.status}}")).expect("resolves"), json!("ok"));
        assert_eq!(resolver.resolve(&json!("{{step1.tool_result.result.a}}")).expect("resolves"), json!(1));
    }

    #[test]
    fn falls_back_to_tool_arguments() {
        let mut ledger = ExecutionLedger::new();
        ledger.append(ExecutionResult::succeeded("step1", 0, "search", json!({"query": "rust"}), json!({"hits": 2})));
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.query}}")).expect("resolves"), json!("rust"));
    }

    #[test]
    fn skipped_step_routes_to_previous_output() {
        let mut ledger = ExecutionLedger::new();
        ledger.append(ExecutionResult::succeeded("step1", 0, "tool", json!({}), json!({"x": "A"})));
        ledger.append(ExecutionResult::skipped("step2", 1, "tool", json!({}), "branch not taken"));
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step2.x}}")).expect("resolves"), json!("A"));
    }

    #[test]
    fn missing_step_is_step_result_not_found() {
        let ledger = ledger_with(vec![json!({"a": 1})]);
        let resolver = PlaceholderResolver::new(&ledger);
        let error = resolver.resolve(&json!("{{step9.a}}")).expect_err("fails");
        assert_eq!(
            error,
            ResolutionError::StepResultNotFound {
                placeholder: "{{step9.a}}".into(),
                source: LedgerLookupError::NoEntry { step: 9 },
            }
        );
    }

    #[test]
    fn oversized_step_number_is_step_result_not_found() {
        let ledger = ledger_with(vec![json!({"a": 1})]);
        let resolver = PlaceholderResolver::new(&ledger);

        let whole = resolver.resolve(&json!({"q": "{{step99999999999999999999999.a}}"})).expect_err("fails");
        assert!(matches!(
            whole,
            ResolutionError::StepResultNotFound { ref placeholder, source: LedgerLookupError::NoEntry { .. } }
                if placeholder == "{{step99999999999999999999999.a}}"
        ));

        let embedded = resolver.resolve(&json!("x {{step1.a}} {{step99999999999999999999999.a}}")).expect_err("fails");
        assert!(matches!(embedded, ResolutionError::StepResultNotFound { .. }));
    }

    #[test]
    fn missing_field_lists_available_fields() {
        let ledger = ledger_with(vec![json!({"title": "T", "meta": {"size": 1}})]);
        let resolver = PlaceholderResolver::new(&ledger);
        let error = resolver.resolve(&json!("see {{step1.missing}}")).expect_err("fails");
        match error {
            ResolutionError::PlaceholderNotFound {
                placeholder,
                tool_name,
                available_fields,
                ..
            } => {
                assert_eq!(placeholder, "{{step1.missing}}");
                assert_eq!(tool_name, "tool");
                assert_eq!(available_fields, vec!["title", "meta", "meta.size"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn null_field_is_found_not_missing() {
        let ledger = ledger_with(vec![json!({"maybe": null})]);
        let resolver = PlaceholderResolver::new(&ledger);
        assert_eq!(resolver.resolve(&json!("{{step1.maybe}}")).expect("resolves"), Value::Null);
    }
}
