//! Passive performance tracking.
//!
//! # Responsibilities
//! - Observe outbound request outcomes
//! - Maintain streaming averages of latency and error rate
//!
//! # Design Decisions
//! - Latency average halves toward each new sample; the first sample seeds it
//! - Error rate moves by fixed steps and stays within [0, 1]
//! - Counters are never reset while the process lives

use std::sync::{Mutex, MutexGuard};

use crate::health::state::PerformanceMetrics;

/// Step added to the error rate per failed call.
pub const ERROR_STEP: f64 = 0.1;
/// Step subtracted from the error rate per successful call.
pub const SUCCESS_STEP: f64 = 0.01;

#[derive(Debug, Default)]
struct Inner {
    metrics: PerformanceMetrics,
    samples: u64,
}

/// Thread-safe holder of [`PerformanceMetrics`].
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    inner: Mutex<Inner>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_response_time(&self, ms: f64) {
        if !ms.is_finite() || ms < 0.0 {
            return;
        }
        let mut inner = self.lock();
        inner.metrics.response_time_ewma = if inner.samples == 0 {
            ms
        } else {
            (inner.metrics.response_time_ewma + ms) / 2.0
        };
        inner.samples += 1;
    }

    pub fn record_error(&self) {
        let mut inner = self.lock();
        inner.metrics.error_rate_ewma = (inner.metrics.error_rate_ewma + ERROR_STEP).clamp(0.0, 1.0);
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.metrics.error_rate_ewma = (inner.metrics.error_rate_ewma - SUCCESS_STEP).clamp(0.0, 1.0);
    }

    pub fn snapshot(&self) -> PerformanceMetrics {
        self.lock().metrics
    }

    /// Number of latency samples observed.
    pub fn samples(&self) -> u64 {
        self.lock().samples
    }
}
