//! Stateless input sanitization.
//!
//! Every function is total: malformed input yields a safe fallback
//! (escaped text, `None`, or a placeholder) instead of an error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

const MAX_FILENAME_CHARS: usize = 255;

static EVENT_HANDLERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on(error|load|click)").expect("static pattern"));
static SCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("static pattern"));

/// Escape HTML metacharacters and neutralize known handler/scheme payloads.
pub fn sanitize_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '/' => escaped.push_str("&#x2F;"),
            _ => escaped.push(c),
        }
    }
    let neutralized = EVENT_HANDLERS.replace_all(&escaped, "blocked-event");
    SCRIPT_SCHEME
        .replace_all(&neutralized, "blocked-scheme:")
        .into_owned()
}

/// Trim, lowercase and keep only `[a-z0-9@._-]`.
pub fn sanitize_email(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '@' | '.' | '_' | '-'))
        .collect()
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`, collapse runs of `_`
/// and cap the length. Never returns an empty name.
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_FILENAME_CHARS));
    for c in input.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let truncated: String = out.chars().take(MAX_FILENAME_CHARS).collect();
    if truncated.is_empty() {
        "_".to_string()
    } else {
        truncated
    }
}

/// Normalized URL if it parses and uses http or https.
pub fn sanitize_url(input: &str) -> Option<String> {
    let url = Url::parse(input.trim()).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

/// Parse JSON and HTML-sanitize every string leaf and object key.
pub fn sanitize_json(input: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(input).ok()?;
    Some(sanitize_value(value))
}

fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_html(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => {
            let mut sanitized = Map::with_capacity(map.len());
            for (key, value) in map {
                let clean = sanitize_html(&key);
                // Distinct keys can neutralize to the same text; the earlier entry wins.
                if sanitized.contains_key(&clean) {
                    tracing::warn!(key = %clean, "Dropped JSON entry whose sanitized key collides");
                    continue;
                }
                sanitized.insert(clean, sanitize_value(value));
            }
            Value::Object(sanitized)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_plain_text_unchanged() {
        assert_eq!(sanitize_html("Hello world 123"), "Hello world 123");
        assert_eq!(sanitize_html(""), "");
    }

    #[test]
    fn test_html_escapes() {
        assert_eq!(
            sanitize_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;&#x2F;a&gt;"
        );
    }

    #[test]
    fn test_html_neutralizes_payloads() {
        let out = sanitize_html(r#"<script>alert(1)</script><img src=x OnError=alert(1)>"#);
        assert!(!out.contains("<script>"));
        assert!(!out.to_lowercase().contains("onerror="));
        assert!(out.contains("blocked-event="));

        let out = sanitize_html("JavaScript:alert(1) onload onclick");
        assert!(!out.to_lowercase().contains("javascript:"));
        assert!(!out.contains("onload"));
        assert!(!out.contains("onclick"));
    }

    #[test]
    fn test_email() {
        assert_eq!(sanitize_email("  John.Doe+tag@Example.COM "), "john.doetag@example.com");
        assert_eq!(sanitize_email("<script>@x.io"), "script@x.io");
        assert_eq!(sanitize_email(""), "");
    }

    #[test]
    fn test_filename() {
        assert_eq!(sanitize_filename("my report (final).pdf"), "my_report_final_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("a___b"), "a_b");
        assert_eq!(sanitize_filename(""), "_");
        assert_eq!(sanitize_filename("résumé.txt"), "r_sum_.txt");
        assert_eq!(sanitize_filename(&"x".repeat(400)).len(), 255);
    }

    #[test]
    fn test_url() {
        assert_eq!(sanitize_url("https://x.com/a").as_deref(), Some("https://x.com/a"));
        assert_eq!(sanitize_url(" HTTP://X.com ").as_deref(), Some("http://x.com/"));
        assert_eq!(sanitize_url("javascript:alert(1)"), None);
        assert_eq!(sanitize_url("data:text/html,hi"), None);
        assert_eq!(sanitize_url("ftp://files.example.com"), None);
        assert_eq!(sanitize_url("not a url"), None);
    }

    #[test]
    fn test_json() {
        let out = sanitize_json(r#"{"<b>": ["<i>x</i>", 1, true, null], "nested": {"k": "a&b"}}"#)
            .unwrap();
        assert_eq!(
            out,
            json!({
                "&lt;b&gt;": ["&lt;i&gt;x&lt;&#x2F;i&gt;", 1, true, null],
                "nested": {"k": "a&amp;b"}
            })
        );
    }

    #[test]
    fn test_json_colliding_keys_keep_first_entry() {
        let value = sanitize_json(r#"{"onerror": 1, "blocked-event": 2, "name": "x"}"#).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        let kept = object["blocked-event"].as_u64().unwrap();
        assert!(kept == 1 || kept == 2);
        assert_eq!(object["name"], "x");
    }

    #[test]
    fn test_json_invalid() {
        assert_eq!(sanitize_json("{not json"), None);
        assert_eq!(sanitize_json(""), None);
    }
}
