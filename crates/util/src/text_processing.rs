//! # Text Processing Utilities
//!
//! Redaction helpers used before tool arguments reach log output. Tool calls
//! routinely carry API keys and bearer tokens, and the executor logs arguments
//! at debug level.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

/// Object keys whose values are always masked, compared case-insensitively
/// after removing `-` and `_`.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "apikey",
    "accesstoken",
    "authorization",
    "bearer",
    "clientsecret",
    "password",
    "passwd",
    "privatekey",
    "refreshtoken",
    "secret",
    "token",
];

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(authorization:\s+)([^\s]+(?:\s+[^\s]+)*)").expect("authorization regex should compile"),
        Regex::new(r"(?i)((?:^|\b)Bearer\s+)([A-Za-z0-9\-._~+/]+=*)").expect("bearer regex should compile"),
        Regex::new(r"(?i)((?:api[\s_-]?key|auth[\s_-]?token|token|secret|password)\s*[:=]\s*)([^\s,;]+)")
            .expect("inline secret regex should compile"),
        Regex::new(r"(eyJ[A-Za-z0-9\-._~+/]+=*)").expect("jwt regex should compile"),
    ]
});

/// Redacts values that look like secrets in a string.
///
/// Key names are preserved so log lines stay readable.
///
/// # Example
/// ```rust
/// use stepweave_util::redact_sensitive;
///
/// assert_eq!(redact_sensitive("token=abc123"), "token=[REDACTED]");
/// assert_eq!(redact_sensitive("Authorization: Bearer secret123"), "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| match captures.get(2) {
                Some(_) => format!("{}{}", captures.get(1).map(|m| m.as_str()).unwrap_or(""), REDACTED),
                None => REDACTED.to_string(),
            })
            .to_string();
    }
    redacted
}

/// Returns a copy of `value` with secret-looking fields masked.
///
/// Object entries whose key matches a sensitive fragment are replaced wholesale;
/// every other string leaf goes through [`redact_sensitive`].
pub fn redact_json_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, nested)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_json_value(nested))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json_value).collect()),
        Value::String(text) => Value::String(redact_sensitive(text)),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|character| *character != '_' && *character != '-')
        .flat_map(char::to_lowercase)
        .collect();
    SENSITIVE_KEY_FRAGMENTS.iter().any(|fragment| normalized.contains(fragment))
}
