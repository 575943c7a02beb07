//! Health status types and aggregation.
//!
//! # Aggregation
//! ```text
//! Unhealthy: any check Fail, or any dependency Down
//! Degraded:  any check Warn, or any dependency Degraded
//! Healthy:   everything else
//! ```
//!
//! # Design Decisions
//! - Snapshots are derived on demand and never persisted
//! - A dependency status is superseded, never merged, by the next probe

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Environment;

/// Result of probing one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyState {
    Up,
    Degraded,
    Down,
}

impl DependencyState {
    /// Gauge value exported for the dependency.
    pub fn metric_value(&self) -> f64 {
        match self {
            DependencyState::Up => 1.0,
            DependencyState::Degraded => 0.5,
            DependencyState::Down => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub status: DependencyState,
    pub response_time_ms: Option<u64>,
    pub last_checked: DateTime<Utc>,
    pub error: Option<String>,
}

/// Outcome of an internal check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<f64>,
}

impl SystemCheck {
    pub fn new(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            observed_value: None,
        }
    }

    pub fn pass(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Pass, message)
    }

    pub fn warn(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warn, message)
    }

    pub fn fail(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, message)
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.observed_value = Some(value);
        self
    }
}

/// Streaming averages fed by completed outbound calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub response_time_ewma: f64,
    pub error_rate_ewma: f64,
}

/// Aggregated status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    pub fn metric_value(&self) -> f64 {
        match self {
            OverallStatus::Healthy => 2.0,
            OverallStatus::Degraded => 1.0,
            OverallStatus::Unhealthy => 0.0,
        }
    }
}

/// Full diagnostic snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "uptime")]
    pub uptime_seconds: u64,
    pub version: String,
    pub environment: Environment,
    pub checks: Vec<SystemCheck>,
    pub performance: PerformanceMetrics,
    pub dependencies: Vec<DependencyStatus>,
}

impl HealthStatus {
    /// Collapsed view for load-balancer probes.
    pub fn liveness(&self) -> Liveness {
        Liveness {
            status: if self.status == OverallStatus::Unhealthy {
                LivenessState::Error
            } else {
                LivenessState::Ok
            },
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessState {
    Ok,
    Error,
}

/// `{status: "ok"|"error", timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liveness {
    pub status: LivenessState,
    pub timestamp: String,
}

impl Liveness {
    pub fn error_now() -> Self {
        Self {
            status: LivenessState::Error,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Derive the overall status from checks and dependency results.
pub fn aggregate(checks: &[SystemCheck], dependencies: &[DependencyStatus]) -> OverallStatus {
    let critical = checks.iter().any(|c| c.status == CheckStatus::Fail)
        || dependencies.iter().any(|d| d.status == DependencyState::Down);
    if critical {
        return OverallStatus::Unhealthy;
    }
    let warning = checks.iter().any(|c| c.status == CheckStatus::Warn)
        || dependencies.iter().any(|d| d.status == DependencyState::Degraded);
    if warning {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    }
}
