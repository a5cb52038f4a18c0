//! Log Redaction
//!
//! Scrubs API keys, bearer tokens, webhook signatures and phone numbers from
//! strings and JSON payloads prior to logging.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("valid regex")
});
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9_\-]{20,})|(xai-[a-zA-Z0-9]{20,})|(AIza[0-9A-Za-z_\-]{30,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)")
        .expect("valid regex")
});
static QUERY_SECRET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(api_key|apikey|key|token|access_token|signature)=([^&\s]+)").expect("valid regex")
});

/// JSON keys whose values are dropped wholesale.
const SENSITIVE_KEYS: &[&str] = &[
    "authorization",
    "api_key",
    "apikey",
    "x-api-key",
    "xi-api-key",
    "token",
    "access_token",
    "secret",
    "signature",
    "password",
];

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = TELEPHONE_RE.replace_all(input, "[REDACTED_PHONE]");
    let redacted = API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    QUERY_SECRET_RE
        .replace_all(&redacted, "$1=[REDACTED_TOKEN]")
        .into_owned()
}

/// Redacted copy of a JSON value: sensitive keys are masked, every string
/// is passed through [`redact_sensitive_data`].
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_sensitive_data(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let masked = if SENSITIVE_KEYS.contains(&k.to_ascii_lowercase().as_str()) {
                        Value::String("[REDACTED]".to_string())
                    } else {
                        redact_json(v)
                    };
                    (k.clone(), masked)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
