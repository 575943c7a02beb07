//! Sliding-window attempt limiting with temporary blocking.
//!
//! # State Transitions
//! ```text
//! NoRecord → Counting: first recorded attempt opens a window
//! Counting → Counting: attempts below max_attempts
//! Counting → Blocked: check_limit sees count >= max_attempts
//! Counting → NoRecord: window elapsed, or reset_on_success
//! Blocked → NoRecord: block elapsed, or reset_on_success
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Attempt history for one identifier.
#[derive(Debug, Clone)]
struct RateLimitRecord {
    count: u32,
    window_start: Instant,
    blocked_until: Option<Instant>,
}

impl RateLimitRecord {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_until: None,
        }
    }

    fn window_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }

    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    fn block_expired(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now >= until)
    }

    /// Whether the record carries no information any more.
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        self.block_expired(now) || (self.blocked_until.is_none() && self.window_expired(now, window))
    }
}

/// Outcome of [`RateLimiter::check_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after_secs: Option<u64>,
}

impl RateLimitDecision {
    pub(crate) fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: None,
        }
    }

    fn deny(remaining: Duration) -> Self {
        let secs = remaining.as_millis().div_ceil(1000).max(1);
        Self {
            allowed: false,
            retry_after_secs: Some(u64::try_from(secs).unwrap_or(u64::MAX)),
        }
    }
}

/// Per-identifier sliding-window limiter.
///
/// One mutex guards the whole map; no operation calls out while holding it.
#[derive(Debug)]
pub struct RateLimiter {
    records: Mutex<HashMap<String, RateLimitRecord>>,
    denied: AtomicU64,
    max_attempts: u32,
    window: Duration,
    block_duration: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            denied: AtomicU64::new(0),
            max_attempts: config.max_attempts,
            window: Duration::from_millis(config.window_ms),
            block_duration: Duration::from_millis(config.block_duration_ms),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitRecord>> {
        // Records stay consistent across a panic, so a poisoned lock is usable.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether `identifier` may attempt now. May transition to Blocked.
    pub fn check_limit(&self, identifier: &str) -> RateLimitDecision {
        self.check_limit_at(identifier, Instant::now())
    }

    pub(crate) fn check_limit_at(&self, identifier: &str, now: Instant) -> RateLimitDecision {
        let mut records = self.lock();
        let Some(record) = records.get_mut(identifier) else {
            return RateLimitDecision::allow();
        };

        if let Some(until) = record.blocked_until {
            if now < until {
                self.count_denial();
                return RateLimitDecision::deny(until - now);
            }
        }
        if record.is_stale(now, self.window) {
            records.remove(identifier);
            return RateLimitDecision::allow();
        }
        if record.count >= self.max_attempts {
            record.blocked_until = Some(now + self.block_duration);
            self.count_denial();
            tracing::warn!(
                identifier = %identifier,
                attempts = record.count,
                block_secs = self.block_duration.as_secs(),
                "Identifier blocked after too many attempts"
            );
            return RateLimitDecision::deny(self.block_duration);
        }
        RateLimitDecision::allow()
    }

    fn count_denial(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
        metrics::record_rate_limited();
    }

    /// Count an attempt in the current window, opening a new one if needed.
    pub fn record_attempt(&self, identifier: &str) {
        self.record_attempt_at(identifier, Instant::now());
    }

    pub(crate) fn record_attempt_at(&self, identifier: &str, now: Instant) {
        let mut records = self.lock();
        let record = records
            .entry(identifier.to_string())
            .or_insert_with(|| RateLimitRecord::new(now));
        if record.is_stale(now, self.window) {
            *record = RateLimitRecord::new(now);
        }
        record.count = record.count.saturating_add(1);
    }

    /// Forget every prior attempt for `identifier`.
    pub fn reset_on_success(&self, identifier: &str) {
        self.lock().remove(identifier);
    }

    /// Attempts counted in the live window (0 once it has expired).
    pub fn attempt_count(&self, identifier: &str) -> u32 {
        self.attempt_count_at(identifier, Instant::now())
    }

    pub(crate) fn attempt_count_at(&self, identifier: &str, now: Instant) -> u32 {
        match self.lock().get(identifier) {
            Some(record) if !record.is_stale(now, self.window) => record.count,
            _ => 0,
        }
    }

    /// Drop records whose window and block have both expired.
    /// Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    pub(crate) fn cleanup_at(&self, now: Instant) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| {
            let window_live = !record.window_expired(now, self.window);
            window_live || record.is_blocked(now)
        });
        before - records.len()
    }

    /// Number of identifiers with a record.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    /// Denied checks since construction.
    pub fn denied_total(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    /// Number of identifiers currently blocked.
    pub fn blocked(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|r| r.is_blocked(now)).count()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` until shutdown.
    pub fn spawn_cleanup(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.cleanup();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = self.tracked(), "Rate limit records cleaned up");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit cleanup received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}
