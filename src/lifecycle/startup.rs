//! Startup health gate.
//!
//! # Responsibilities
//! - Decide whether the startup health snapshot allows the service to run
//!
//! # Design Decisions
//! - Fail fast only in hardened mode and only on `Unhealthy`
//! - `Degraded` always proceeds with a warning

use serde_json::json;
use thiserror::Error;

use crate::health::{CheckStatus, DependencyState, HealthStatus, OverallStatus};
use crate::observability::StructuredLogger;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("system unhealthy at startup: {}", failing.join(", "))]
    Unhealthy { failing: Vec<String> },
}

/// Names of the failing checks and down dependencies.
pub fn failing_components(status: &HealthStatus) -> Vec<String> {
    let checks = status
        .checks
        .iter()
        .filter(|c| c.status == CheckStatus::Fail)
        .map(|c| format!("check {}: {}", c.name, c.message));
    let deps = status
        .dependencies
        .iter()
        .filter(|d| d.status == DependencyState::Down)
        .map(|d| match &d.error {
            Some(err) => format!("dependency {}: {}", d.name, err),
            None => format!("dependency {}", d.name),
        });
    checks.chain(deps).collect()
}

/// Evaluate the startup snapshot.
pub fn verify_startup_health(
    status: &HealthStatus,
    hardened: bool,
    logger: &StructuredLogger,
) -> Result<(), StartupError> {
    match status.status {
        OverallStatus::Healthy => {
            logger.info("Startup health check passed", json!({}));
            Ok(())
        }
        OverallStatus::Degraded => {
            logger.warn(
                "System degraded at startup",
                json!({ "checks": status.checks, "dependencies": status.dependencies }),
            );
            Ok(())
        }
        OverallStatus::Unhealthy => {
            let failing = failing_components(status);
            logger.error("System unhealthy at startup", json!({ "failing": failing }));
            if hardened {
                Err(StartupError::Unhealthy { failing })
            } else {
                Ok(())
            }
        }
    }
}
