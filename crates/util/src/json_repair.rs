//! Best-effort repair of almost-JSON text.
//!
//! Planners frequently emit step arguments as text that is nearly JSON: wrapped
//! in a Markdown fence, typed with typographic quotes, or carrying a trailing
//! comma. These helpers fix those shapes before handing the text to
//! `serde_json`. They never try to make sense of free-form prose.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("code fence regex should compile"));

/// Parses `text` as JSON, retrying once with [`repair_json`] applied.
///
/// The error from the repaired attempt is returned when both attempts fail.
pub fn parse_repaired_json(text: &str) -> Result<Value, serde_json::Error> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }
    let repaired = serde_json::from_str::<Value>(&repair_json(text))?;
    debug!("parsed JSON after repair");
    Ok(repaired)
}

/// Applies the repair passes to `text` and returns the rewritten string.
///
/// Passes run in order: fence stripping, typographic quote replacement, and
/// trailing comma removal. Each pass only touches the shapes it knows about.
pub fn repair_json(text: &str) -> String {
    let unfenced = strip_code_fence(text.trim());
    let straightened = replace_typographic_quotes(unfenced);
    remove_trailing_commas(&straightened)
}

fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|captures| captures.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text,
    }
}

fn replace_typographic_quotes(text: &str) -> String {
    text.chars()
        .map(|character| match character {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            other => other,
        })
        .collect()
}

/// Drops commas that directly precede `}` or `]`, ignoring string contents.
fn remove_trailing_commas(text: &str) -> String {
    let characters: Vec<char> = text.chars().collect();
    let mut output = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (index, &character) in characters.iter().enumerate() {
        if in_string {
            output.push(character);
            if escaped {
                escaped = false;
            } else if character == '\\' {
                escaped = true;
            } else if character == '"' {
                in_string = false;
            }
            continue;
        }

        match character {
            '"' => {
                in_string = true;
                output.push(character);
            }
            ',' => {
                let next_significant = characters[index + 1..].iter().find(|candidate| !candidate.is_whitespace());
                if !matches!(next_significant, Some('}') | Some(']')) {
                    output.push(character);
                }
            }
            _ => output.push(character),
        }
    }

    output
}
