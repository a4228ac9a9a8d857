//! Field-path snapshots used in "placeholder not found" diagnostics.

use serde_json::Value;

/// Nesting depth included in a snapshot.
pub const MAX_FIELD_DEPTH: usize = 3;
/// Upper bound on the number of paths attached to an error.
pub const MAX_AVAILABLE_FIELDS: usize = 50;

/// Collects dot-paths of fields in `value`, up to [`MAX_FIELD_DEPTH`] levels.
///
/// Arrays contribute their first element as `key[0]`, so a search response
/// yields `results`, `results[0]`, `results[0].title`, and so on. Scalars at
/// the root yield nothing.
pub fn available_field_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_field_paths(value, "", 1, &mut paths);
    paths.truncate(MAX_AVAILABLE_FIELDS);
    paths
}

fn collect_field_paths(value: &Value, current_path: &str, depth: usize, paths: &mut Vec<String>) {
    if depth > MAX_FIELD_DEPTH || paths.len() >= MAX_AVAILABLE_FIELDS {
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, nested_value) in map {
                let next_path = if current_path.is_empty() {
                    key.to_string()
                } else {
                    format!("{current_path}.{key}")
                };
                paths.push(next_path.clone());
                collect_field_paths(nested_value, &next_path, depth + 1, paths);
            }
        }
        Value::Array(items) => {
            let Some(first) = items.first() else {
                return;
            };
            let next_path = format!("{current_path}[0]");
            if !current_path.is_empty() {
                paths.push(next_path.clone());
            }
            collect_field_paths(first, &next_path, depth + 1, paths);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshots_three_levels() {
        let value = json!({
            "query": "rust",
            "results": [{"title": "T", "meta": {"deep": {"deeper": 1}}}]
        });
        let paths = available_field_paths(&value);
        assert_eq!(
            paths,
            vec!["query", "results", "results[0]", "results[0].title", "results[0].meta"]
        );
    }

    #[test]
    fn scalars_and_empty_values_have_no_fields() {
        assert!(available_field_paths(&json!("text")).is_empty());
        assert!(available_field_paths(&json!({})).is_empty());
        assert!(available_field_paths(&json!([])).is_empty());
    }

    #[test]
    fn root_arrays_use_index_prefix() {
        let paths = available_field_paths(&json!([{"id": 1}]));
        assert_eq!(paths, vec!["[0].id"]);
    }

    #[test]
    fn snapshot_is_capped() {
        let map: serde_json::Map<String, Value> = (0..80).map(|index| (format!("field{index}"), json!(index))).collect();
        assert_eq!(available_field_paths(&Value::Object(map)).len(), MAX_AVAILABLE_FIELDS);
    }
}
