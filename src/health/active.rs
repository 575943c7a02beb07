//! Health monitoring.
//!
//! # Responsibilities
//! - Compute the aggregated [`HealthStatus`] on demand
//! - Recompute it periodically in a background task
//! - Cache the latest snapshot for cheap reads

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{DependencyConfig, Environment, GatekeeperConfig};
use crate::health::checks::{CheckSource, PerformanceCheck};
use crate::health::passive::PerformanceTracker;
use crate::health::probe::DependencyProbe;
use crate::health::state::{aggregate, HealthStatus, OverallStatus};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::{metrics, StructuredLogger};

struct BackgroundTask {
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

pub struct HealthMonitor {
    probe: DependencyProbe,
    dependencies: Vec<DependencyConfig>,
    checks: RwLock<Vec<Arc<dyn CheckSource>>>,
    performance: Arc<PerformanceTracker>,
    snapshot: ArcSwapOption<HealthStatus>,
    started_at: Instant,
    version: String,
    environment: Environment,
    logger: StructuredLogger,
    background: Mutex<Option<BackgroundTask>>,
}

impl HealthMonitor {
    /// Build a monitor with the built-in performance check registered.
    pub fn new(config: &GatekeeperConfig, logger: StructuredLogger) -> Self {
        let probe = DependencyProbe::new(Duration::from_millis(config.health.probe_timeout_ms));
        Self::with_probe(config, logger, probe)
    }

    pub fn with_probe(config: &GatekeeperConfig, logger: StructuredLogger, probe: DependencyProbe) -> Self {
        let performance = Arc::new(PerformanceTracker::new());
        let perf_check: Arc<dyn CheckSource> =
            Arc::new(PerformanceCheck::new(performance.clone(), &config.health));

        Self {
            probe,
            dependencies: config.health.dependencies.clone(),
            checks: RwLock::new(vec![perf_check]),
            performance,
            snapshot: ArcSwapOption::empty(),
            started_at: Instant::now(),
            version: config.service.version.clone(),
            environment: config.environment,
            logger,
            background: Mutex::new(None),
        }
    }

    /// Add an internal check evaluated on every status computation.
    pub fn register_check(&self, source: Arc<dyn CheckSource>) {
        self.checks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(source);
    }

    pub fn performance(&self) -> &Arc<PerformanceTracker> {
        &self.performance
    }

    pub fn record_response_time(&self, ms: f64) {
        self.performance.record_response_time(ms);
    }

    pub fn record_error(&self) {
        self.performance.record_error();
    }

    pub fn record_success(&self) {
        self.performance.record_success();
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Run every check and probe, then cache and return the result.
    pub async fn get_status(&self) -> HealthStatus {
        let sources: Vec<Arc<dyn CheckSource>> = self
            .checks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let checks: Vec<_> = sources.iter().map(|source| source.check()).collect();
        let dependencies = self.probe.check_all(&self.dependencies).await;
        let status = aggregate(&checks, &dependencies);

        let snapshot = HealthStatus {
            status,
            timestamp: Utc::now(),
            uptime_seconds: self.uptime().as_secs(),
            version: self.version.clone(),
            environment: self.environment,
            checks,
            performance: self.performance.snapshot(),
            dependencies,
        };

        metrics::record_health_status(status.metric_value());
        self.snapshot.store(Some(Arc::new(snapshot.clone())));
        snapshot
    }

    /// Most recent snapshot, if any computation has completed.
    pub fn last_status(&self) -> Option<Arc<HealthStatus>> {
        self.snapshot.load_full()
    }

    fn background(&self) -> MutexGuard<'_, Option<BackgroundTask>> {
        self.background.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_monitoring(&self) -> bool {
        self.background().is_some()
    }

    /// Spawn the periodic recomputation loop.
    ///
    /// Returns `false` without spawning when a loop is already running.
    pub fn start_background_monitoring(self: &Arc<Self>, interval: Duration) -> bool {
        let mut background = self.background();
        if background.is_some() {
            return false;
        }

        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let monitor = Arc::clone(self);

        let handle = tokio::spawn(async move {
            tracing::info!(interval_ms = interval.as_millis() as u64, "Health monitor starting");
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = monitor.tick() => {}
                            _ = rx.recv() => break,
                        }
                    }
                    _ = rx.recv() => break,
                }
            }
            tracing::info!("Health monitor received shutdown signal, exiting loop");
        });

        *background = Some(BackgroundTask { shutdown, handle });
        true
    }

    /// Stop the background loop and wait for it to exit. No-op when idle.
    pub async fn stop(&self) {
        let task = self.background().take();
        if let Some(task) = task {
            task.shutdown.trigger();
            if let Err(e) = task.handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Health monitor task panicked");
                }
            }
        }
    }

    async fn tick(&self) {
        let status = self.get_status().await;
        let context = json!({
            "status": status.status,
            "dependencies": status.dependencies.len(),
            "response_time_ewma": status.performance.response_time_ewma,
            "error_rate_ewma": status.performance.error_rate_ewma,
        });
        match status.status {
            OverallStatus::Healthy => self.logger.debug("System health check", context),
            OverallStatus::Degraded => self.logger.warn("System health degraded", context),
            OverallStatus::Unhealthy => self.logger.error("System unhealthy", context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::{CheckStatus, SystemCheck};
    use crate::observability::{LogLevel, MemorySink};

    struct FixedCheck(CheckStatus);

    impl CheckSource for FixedCheck {
        fn name(&self) -> &str {
            "fixed"
        }

        fn check(&self) -> SystemCheck {
            SystemCheck::new("fixed", self.0, "fixed result")
        }
    }

    fn monitor() -> (Arc<HealthMonitor>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = StructuredLogger::new(LogLevel::Debug, sink.clone());
        (Arc::new(HealthMonitor::new(&GatekeeperConfig::default(), logger)), sink)
    }

    #[tokio::test]
    async fn test_healthy_without_dependencies() {
        let (monitor, _) = monitor();
        assert!(monitor.last_status().is_none());

        let status = monitor.get_status().await;
        assert_eq!(status.status, OverallStatus::Healthy);
        assert_eq!(status.checks.len(), 1);
        assert_eq!(status.checks[0].name, "performance");
        assert_eq!(monitor.last_status().unwrap().status, OverallStatus::Healthy);
    }

    #[tokio::test]
    async fn test_registered_checks_drive_status() {
        let (monitor, _) = monitor();
        monitor.register_check(Arc::new(FixedCheck(CheckStatus::Warn)));
        assert_eq!(monitor.get_status().await.status, OverallStatus::Degraded);

        monitor.register_check(Arc::new(FixedCheck(CheckStatus::Fail)));
        assert_eq!(monitor.get_status().await.status, OverallStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_performance_feeds_status() {
        let (monitor, _) = monitor();
        monitor.record_response_time(2000.0);
        let status = monitor.get_status().await;
        assert_eq!(status.status, OverallStatus::Degraded);
        assert_eq!(status.performance.response_time_ewma, 2000.0);

        monitor.record_success();
        monitor.record_error();
        assert!((monitor.performance().snapshot().error_rate_ewma - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_background_monitoring_start_stop() {
        let (monitor, sink) = monitor();
        monitor.register_check(Arc::new(FixedCheck(CheckStatus::Warn)));

        assert!(monitor.start_background_monitoring(Duration::from_millis(20)));
        assert!(!monitor.start_background_monitoring(Duration::from_millis(20)));
        assert!(monitor.is_monitoring());

        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.stop().await;
        assert!(!monitor.is_monitoring());

        let degraded = sink
            .records()
            .iter()
            .filter(|r| r.message == "System health degraded")
            .count();
        assert!(degraded >= 1);

        // No further ticks after stop.
        sink.clear();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(sink.records().is_empty());

        // Stopping again is harmless.
        monitor.stop().await;
    }
}
