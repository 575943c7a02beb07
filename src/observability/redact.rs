//! PII redaction applied to every logged context.
//!
//! One policy covers both security events and general log records:
//! - keys that look like credentials are replaced wholesale
//! - string values that look like email addresses are masked
//! - nested objects and arrays are walked

use serde_json::{Map, Value};

/// Replacement for credential-like values.
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "authorization",
    "cookie",
    "api_key",
    "apikey",
    "session",
];

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Mask the local part of an email, keeping at most two leading characters.
///
/// At least one character is always masked so short addresses never leak
/// in full. Values without an `@` are masked entirely.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, _)) if local.ends_with("***") => email.to_string(),
        Some((local, domain)) => {
            let visible = local.chars().count().saturating_sub(1).min(2);
            let kept: String = local.chars().take(visible).collect();
            format!("{}***@{}", kept, domain)
        }
        None => "***".to_string(),
    }
}

/// Apply the redaction policy to a JSON value in place.
pub fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => redact_map(map),
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        Value::String(s) if looks_like_email(s) => *s = mask_email(s),
        _ => {}
    }
}

/// Apply the redaction policy to every entry of a map.
pub fn redact_map(map: &mut Map<String, Value>) {
    for (key, value) in map.iter_mut() {
        if is_sensitive_key(key) && !value.is_null() {
            *value = Value::String(REDACTED.to_string());
        } else {
            redact_value(value);
        }
    }
}
