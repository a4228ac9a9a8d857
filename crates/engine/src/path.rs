//! Dotted/indexed navigation over JSON values.
//!
//! Paths look like `a.b[2].c`. A purely numeric segment indexes an array, so
//! `items.0.id` and `items[0].id` address the same value. Absence is reported as
//! `None` and never as an error; a key that exists with a `null` value yields
//! `Some(&Value::Null)`.

use serde_json::Value;

/// Selects the value at `path` inside `value`.
///
/// An empty path selects `value` itself. Navigation stops with `None` as soon
/// as a segment is missing or is applied to a value that cannot be indexed
/// (including `null`).
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for segment in trimmed.split('.') {
        if segment.is_empty() {
            continue;
        }
        let (key, indices) = split_indices(segment)?;
        if !key.is_empty() {
            current = step_into(current, key)?;
        }
        for index in indices {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Returns the final path segment with any trailing index suffix removed,
/// together with the byte range it occupies in `path`.
///
/// `results[0].link` yields `("link", 11..15)` and `items[2]` yields
/// `("items", 0..5)`.
pub fn last_key_segment(path: &str) -> Option<(&str, std::ops::Range<usize>)> {
    let start = path.rfind('.').map_or(0, |dot| dot + 1);
    let tail = &path[start..];
    let end = start + tail.find('[').unwrap_or(tail.len());
    if end == start {
        return None;
    }
    Some((&path[start..end], start..end))
}

fn step_into<'a>(current: &'a Value, key: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

/// Splits `items[0][1]` into `("items", [0, 1])`. Malformed brackets make the
/// whole segment unresolvable.
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let key = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].trim().parse::<usize>().ok()?);
        rest = &inner[close + 1..];
    }
    Some((key, indices))
}
