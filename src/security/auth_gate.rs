//! Authentication guard combining rate limiting with security events.
//!
//! Every login code path is expected to follow:
//! ```text
//! guard_attempt → (if allowed) caller's own credential check
//!               → record_attempt
//!               → record_success xor record_failure
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::security::events::SecurityEventLogger;
use crate::security::rate_limit::{RateLimitDecision, RateLimiter};

/// Guards login attempts. Never fails; denial is a regular result.
#[derive(Debug, Clone)]
pub struct AuthSecurityGate {
    limiter: Arc<RateLimiter>,
    events: Arc<SecurityEventLogger>,
    enabled: bool,
}

impl AuthSecurityGate {
    /// With `enabled == false` every attempt is allowed but events are
    /// still emitted.
    pub fn new(limiter: Arc<RateLimiter>, events: Arc<SecurityEventLogger>, enabled: bool) -> Self {
        Self {
            limiter,
            events,
            enabled,
        }
    }

    /// Consult the limiter before the caller checks credentials.
    pub fn guard_attempt(&self, identifier: &str, email: Option<&str>) -> RateLimitDecision {
        if !self.enabled {
            return RateLimitDecision::allow();
        }
        let decision = self.limiter.check_limit(identifier);
        if !decision.allowed {
            self.events
                .rate_limit_exceeded(identifier, email, decision.retry_after_secs.unwrap_or_default());
        }
        decision
    }

    pub fn record_attempt(&self, identifier: &str, email: Option<&str>) {
        if self.enabled {
            self.limiter.record_attempt(identifier);
        }
        self.events.auth_attempt(identifier, email);
    }

    /// A successful login clears all prior failed attempts.
    pub fn record_success(&self, identifier: &str, email: Option<&str>, actor_id: Option<&str>) {
        self.limiter.reset_on_success(identifier);
        self.events.auth_success(identifier, email, actor_id);
    }

    /// Only emits the event; the attempt was already counted.
    pub fn record_failure(&self, identifier: &str, email: Option<&str>, reason: &str) {
        self.events.auth_failure(identifier, email, reason);
    }

    /// Report a rejected anti-forgery token as suspicious activity.
    pub fn report_csrf_failure(&self, method: &str, url: &str) {
        let mut details = Map::new();
        details.insert("method".into(), Value::from(method));
        details.insert("url".into(), Value::from(url));
        self.events.suspicious_activity("CSRF token mismatch", details);
    }

    pub fn attempt_count(&self, identifier: &str) -> u32 {
        self.limiter.attempt_count(identifier)
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn events(&self) -> &Arc<SecurityEventLogger> {
        &self.events
    }
}
