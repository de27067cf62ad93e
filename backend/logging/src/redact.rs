//! Log Redaction
//!
//! Scrubs API keys, bearer tokens and credential-named fields before logging.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9]{32,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap()
});
static SECRET_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(password|secret|token|api[_-]?key)").unwrap());

const REDACTED: &str = "[REDACTED]";

/// Redacts token patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    TOKEN_RE.replace_all(input, "[REDACTED_TOKEN]").into_owned()
}

/// Redacts a JSON tree: credential-named fields are blanked wholesale,
/// every other string is scrubbed of token patterns.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_sensitive_data(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if SECRET_KEY_RE.is_match(k) {
                        Value::String(REDACTED.into())
                    } else {
                        redact_value(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
