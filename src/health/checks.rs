//! Internal system checks.
//!
//! Each [`CheckSource`] inspects in-process state and reports a single
//! [`SystemCheck`]. Sources must be cheap and must not perform I/O; they run
//! on every status computation.

use std::sync::Arc;

use crate::config::HealthConfig;
use crate::health::passive::PerformanceTracker;
use crate::health::state::{CheckStatus, SystemCheck};
use crate::security::RateLimiter;

pub trait CheckSource: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self) -> SystemCheck;
}

/// Compares streaming latency and error rate with the configured thresholds.
pub struct PerformanceCheck {
    tracker: Arc<PerformanceTracker>,
    response_time_warn_ms: f64,
    response_time_critical_ms: f64,
    error_rate_warn: f64,
    error_rate_critical: f64,
}

impl PerformanceCheck {
    pub fn new(tracker: Arc<PerformanceTracker>, config: &HealthConfig) -> Self {
        Self {
            tracker,
            response_time_warn_ms: config.response_time_warn_ms,
            response_time_critical_ms: config.response_time_critical_ms,
            error_rate_warn: config.error_rate_warn,
            error_rate_critical: config.error_rate_critical,
        }
    }
}

impl CheckSource for PerformanceCheck {
    fn name(&self) -> &str {
        "performance"
    }

    fn check(&self) -> SystemCheck {
        let perf = self.tracker.snapshot();
        let latency = perf.response_time_ewma;
        let errors = perf.error_rate_ewma;

        if latency >= self.response_time_critical_ms {
            return SystemCheck::fail(self.name(), format!("response time {:.0}ms is critical", latency))
                .with_value(latency);
        }
        if errors >= self.error_rate_critical {
            return SystemCheck::fail(self.name(), format!("error rate {:.2} is critical", errors))
                .with_value(errors);
        }
        if latency >= self.response_time_warn_ms {
            return SystemCheck::warn(self.name(), format!("response time {:.0}ms is elevated", latency))
                .with_value(latency);
        }
        if errors >= self.error_rate_warn {
            return SystemCheck::warn(self.name(), format!("error rate {:.2} is elevated", errors))
                .with_value(errors);
        }
        SystemCheck::pass(self.name(), "within thresholds").with_value(latency)
    }
}

/// Warns when most tracked identifiers are currently blocked.
pub struct RateLimiterCheck {
    limiter: Arc<RateLimiter>,
}

impl RateLimiterCheck {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl CheckSource for RateLimiterCheck {
    fn name(&self) -> &str {
        "rate_limiter"
    }

    fn check(&self) -> SystemCheck {
        let tracked = self.limiter.tracked();
        let blocked = self.limiter.blocked();
        let message = format!("{} of {} tracked identifiers blocked", blocked, tracked);
        let status = if tracked > 0 && blocked * 2 > tracked {
            CheckStatus::Warn
        } else {
            CheckStatus::Pass
        };
        SystemCheck::new(self.name(), status, message).with_value(blocked as f64)
    }
}

/// Flags hardened deployments that run with protections switched off.
pub struct ConfigurationCheck {
    hardened: bool,
    headers_enabled: bool,
    csrf_enabled: bool,
}

impl ConfigurationCheck {
    pub fn new(hardened: bool, headers_enabled: bool, csrf_enabled: bool) -> Self {
        Self {
            hardened,
            headers_enabled,
            csrf_enabled,
        }
    }
}

impl CheckSource for ConfigurationCheck {
    fn name(&self) -> &str {
        "configuration"
    }

    fn check(&self) -> SystemCheck {
        if !self.hardened {
            return SystemCheck::pass(self.name(), "non-hardened environment");
        }
        let mut disabled = Vec::new();
        if !self.headers_enabled {
            disabled.push("security headers");
        }
        if !self.csrf_enabled {
            disabled.push("csrf protection");
        }
        if disabled.is_empty() {
            SystemCheck::pass(self.name(), "hardened protections enabled")
        } else {
            SystemCheck::warn(self.name(), format!("disabled in hardened mode: {}", disabled.join(", ")))
        }
    }
}
