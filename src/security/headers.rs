//! Security header set.
//!
//! # Responsibilities
//! - Build the fixed header set once from configuration
//! - Apply it to outbound requests and served responses
//!
//! # Headers
//! - Always: X-Content-Type-Options, X-Frame-Options, X-XSS-Protection,
//!   Referrer-Policy
//! - Hardened mode adds: Content-Security-Policy, Strict-Transport-Security,
//!   Permissions-Policy

use axum::http::header::{
    CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::SecurityHeadersConfig;

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Precomputed header set.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
    hardened: bool,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityHeadersConfig, hardened: bool) -> Self {
        if !config.enabled {
            return Self::default();
        }

        let mut headers = vec![
            (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
            (X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
            (REFERRER_POLICY, HeaderValue::from_static("strict-origin-when-cross-origin")),
        ];

        if hardened {
            let hsts = format!("max-age={}; includeSubDomains", config.hsts_max_age_secs);
            for (name, value) in [
                (CONTENT_SECURITY_POLICY, config.content_security_policy.as_str()),
                (STRICT_TRANSPORT_SECURITY, hsts.as_str()),
                (PERMISSIONS_POLICY, config.permissions_policy.as_str()),
            ] {
                match HeaderValue::from_str(value) {
                    Ok(v) => headers.push((name, v)),
                    Err(_) => tracing::warn!(header = %name, "Skipping invalid security header value"),
                }
            }
        }

        Self { headers, hardened }
    }

    /// Insert every header, replacing existing values.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_set() {
        let headers = SecurityHeaders::from_config(&SecurityHeadersConfig::default(), false);
        let mut map = HeaderMap::new();
        headers.apply(&mut map);

        assert_eq!(map.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(map.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(map.get("x-xss-protection").unwrap(), "1; mode=block");
        assert_eq!(map.get("referrer-policy").unwrap(), "strict-origin-when-cross-origin");
        assert!(map.get("strict-transport-security").is_none());
        assert!(!headers.is_hardened());
    }

    #[test]
    fn test_hardened_set() {
        let config = SecurityHeadersConfig {
            hsts_max_age_secs: 600,
            ..SecurityHeadersConfig::default()
        };
        let headers = SecurityHeaders::from_config(&config, true);
        let mut map = HeaderMap::new();
        headers.apply(&mut map);

        assert_eq!(headers.len(), 7);
        assert_eq!(map.get("strict-transport-security").unwrap(), "max-age=600; includeSubDomains");
        assert!(map.contains_key("content-security-policy"));
        assert!(map.contains_key("permissions-policy"));
    }

    #[test]
    fn test_disabled() {
        let config = SecurityHeadersConfig {
            enabled: false,
            ..SecurityHeadersConfig::default()
        };
        assert!(SecurityHeaders::from_config(&config, true).is_empty());
    }

    #[test]
    fn test_apply_overrides_existing() {
        let headers = SecurityHeaders::from_config(&SecurityHeadersConfig::default(), false);
        let mut map = HeaderMap::new();
        map.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        headers.apply(&mut map);
        assert_eq!(map.get("x-frame-options").unwrap(), "DENY");
    }
}
