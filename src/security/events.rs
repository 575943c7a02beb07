//! Security event emission.
//!
//! Events are write-once and observed only through the logger; nothing is
//! stored for later query apart from per-kind counters.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::observability::logging::{LogLevel, StructuredLogger};
use crate::observability::metrics;
use crate::observability::redact::{mask_email, redact_map};

/// Kinds of security-relevant activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    AuthAttempt,
    AuthSuccess,
    AuthFailure,
    RateLimitExceeded,
    SuspiciousActivity,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::AuthAttempt => "auth_attempt",
            SecurityEventKind::AuthSuccess => "auth_success",
            SecurityEventKind::AuthFailure => "auth_failure",
            SecurityEventKind::RateLimitExceeded => "rate_limit_exceeded",
            SecurityEventKind::SuspiciousActivity => "suspicious_activity",
        }
    }

    fn level(&self) -> LogLevel {
        match self {
            SecurityEventKind::AuthAttempt | SecurityEventKind::AuthSuccess => LogLevel::Info,
            SecurityEventKind::AuthFailure | SecurityEventKind::RateLimitExceeded => LogLevel::Warn,
            SecurityEventKind::SuspiciousActivity => LogLevel::Error,
        }
    }
}

/// A single security event. The email is masked on construction.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub kind: SecurityEventKind,
    pub actor_email: Option<String>,
    pub actor_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: Map<String, Value>,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            actor_email: None,
            actor_id: None,
            timestamp: Utc::now(),
            details: Map::new(),
        }
    }

    pub fn with_email(mut self, email: Option<&str>) -> Self {
        self.actor_email = email.filter(|e| !e.is_empty()).map(mask_email);
        self
    }

    pub fn with_actor_id(mut self, actor_id: Option<&str>) -> Self {
        self.actor_id = actor_id.map(str::to_string);
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Totals per event kind since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SecurityEventCounts {
    pub auth_attempts: u64,
    pub auth_successes: u64,
    pub auth_failures: u64,
    pub rate_limit_denials: u64,
    pub suspicious_events: u64,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rate_limited: AtomicU64,
    suspicious: AtomicU64,
}

impl Counters {
    fn bump(&self, kind: SecurityEventKind) {
        let counter = match kind {
            SecurityEventKind::AuthAttempt => &self.attempts,
            SecurityEventKind::AuthSuccess => &self.successes,
            SecurityEventKind::AuthFailure => &self.failures,
            SecurityEventKind::RateLimitExceeded => &self.rate_limited,
            SecurityEventKind::SuspiciousActivity => &self.suspicious,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Emits [`SecurityEvent`]s through a [`StructuredLogger`].
#[derive(Debug)]
pub struct SecurityEventLogger {
    logger: StructuredLogger,
    counters: Counters,
}

impl SecurityEventLogger {
    pub fn new(logger: StructuredLogger) -> Self {
        Self {
            logger,
            counters: Counters::default(),
        }
    }

    /// Log an event. Details pass through the redaction policy first.
    pub fn emit(&self, mut event: SecurityEvent) {
        redact_map(&mut event.details);
        self.counters.bump(event.kind);
        metrics::record_security_event(event.kind.as_str());

        let logger = match &event.actor_id {
            Some(id) => self.logger.with_user(id.as_str()),
            None => self.logger.clone(),
        };
        let context = json!({
            "event": event.kind.as_str(),
            "event_id": event.id.to_string(),
            "email": event.actor_email,
            "details": Value::Object(event.details),
        });
        logger.log(
            event.kind.level(),
            &format!("Security event: {}", event.kind.as_str()),
            context,
        );
    }

    pub fn auth_attempt(&self, identifier: &str, email: Option<&str>) {
        self.emit(
            SecurityEvent::new(SecurityEventKind::AuthAttempt)
                .with_email(email)
                .with_detail("identifier", identifier),
        );
    }

    pub fn auth_success(&self, identifier: &str, email: Option<&str>, actor_id: Option<&str>) {
        self.emit(
            SecurityEvent::new(SecurityEventKind::AuthSuccess)
                .with_email(email)
                .with_actor_id(actor_id)
                .with_detail("identifier", identifier),
        );
    }

    pub fn auth_failure(&self, identifier: &str, email: Option<&str>, reason: &str) {
        self.emit(
            SecurityEvent::new(SecurityEventKind::AuthFailure)
                .with_email(email)
                .with_detail("identifier", identifier)
                .with_detail("reason", reason),
        );
    }

    pub fn rate_limit_exceeded(&self, identifier: &str, email: Option<&str>, retry_after_secs: u64) {
        self.emit(
            SecurityEvent::new(SecurityEventKind::RateLimitExceeded)
                .with_email(email)
                .with_detail("identifier", identifier)
                .with_detail("retry_after_secs", retry_after_secs),
        );
    }

    /// Report anything that looks like an attack but is not an auth outcome.
    pub fn suspicious_activity(&self, description: &str, details: Map<String, Value>) {
        let mut event =
            SecurityEvent::new(SecurityEventKind::SuspiciousActivity).with_detail("description", description);
        event.details.extend(details);
        self.emit(event);
    }

    pub fn counts(&self) -> SecurityEventCounts {
        SecurityEventCounts {
            auth_attempts: self.counters.attempts.load(Ordering::Relaxed),
            auth_successes: self.counters.successes.load(Ordering::Relaxed),
            auth_failures: self.counters.failures.load(Ordering::Relaxed),
            rate_limit_denials: self.counters.rate_limited.load(Ordering::Relaxed),
            suspicious_events: self.counters.suspicious.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::MemorySink;
    use std::sync::Arc;

    fn events() -> (SecurityEventLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = StructuredLogger::new(LogLevel::Debug, sink.clone());
        (SecurityEventLogger::new(logger), sink)
    }

    #[test]
    fn test_email_is_masked() {
        let (events, sink) = events();
        events.auth_attempt("ip-1", Some("john.doe@example.com"));

        let record = &sink.records()[0];
        assert_eq!(record.level, LogLevel::Info);
        assert_eq!(record.context["email"], "jo***@example.com");
        assert_eq!(record.context["event_id"].as_str().unwrap().len(), 36);
        assert!(!sink.lines()[0].contains("john.doe"));
    }

    #[test]
    fn test_levels_per_kind() {
        let (events, sink) = events();
        events.auth_failure("ip-1", None, "bad password");
        events.rate_limit_exceeded("ip-1", None, 30);
        events.suspicious_activity("csrf mismatch", Map::new());

        let levels: Vec<_> = sink.records().iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![LogLevel::Warn, LogLevel::Warn, LogLevel::Error]);
    }

    #[test]
    fn test_actor_id_becomes_user_segment() {
        let (events, sink) = events();
        events.auth_success("ip-1", Some("a@b.io"), Some("user-42"));
        assert!(sink.lines()[0].contains("[User:user-42]"));
    }

    #[test]
    fn test_suspicious_details_redacted() {
        let (events, sink) = events();
        let mut details = Map::new();
        details.insert("submitted_token".into(), json!("deadbeef"));
        details.insert("contact".into(), json!("eve@example.com"));
        events.suspicious_activity("token replay", details);

        let record = &sink.records()[0];
        assert_eq!(record.context["details"]["submitted_token"], "[REDACTED]");
        assert_eq!(record.context["details"]["contact"], "ev***@example.com");
        assert_eq!(record.context["details"]["description"], "token replay");
    }

    #[test]
    fn test_counts() {
        let (events, _) = events();
        events.auth_attempt("ip-1", None);
        events.auth_attempt("ip-1", None);
        events.auth_failure("ip-1", None, "nope");
        let counts = events.counts();
        assert_eq!(counts.auth_attempts, 2);
        assert_eq!(counts.auth_failures, 1);
        assert_eq!(counts.auth_successes, 0);
    }
}
