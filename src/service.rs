//! Security and health service.
//!
//! # Responsibilities
//! - Construct every component from one validated configuration
//! - Run the startup health gate and own the background tasks
//! - Expose status views for the HTTP surface
//!
//! # Lifecycle
//! ```text
//! new → initialize → (serving) → shutdown
//!          ↑                         │
//!          └─────────────────────────┘
//! ```
//! `shutdown` is idempotent; a shut down service may be initialized again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::GatekeeperConfig;
use crate::health::{
    ConfigurationCheck, HealthMonitor, HealthStatus, Liveness, LivenessState, RateLimiterCheck,
};
use crate::http::client::{RequestError, RequestOptions, SecureClient};
use crate::lifecycle::startup::{self, StartupError};
use crate::lifecycle::Shutdown;
use crate::observability::StructuredLogger;
use crate::security::{
    AuthSecurityGate, CsrfTokenManager, RateLimiter, SecurityEventLogger, SecurityHeaders,
    SessionStore,
};

/// Options for [`SecurityService::initialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    pub skip_health_checks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitSettings {
    pub max_attempts: u32,
    pub window_ms: u64,
    pub block_duration_ms: u64,
}

/// Snapshot served at `/security/metrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityMetrics {
    pub tracked_identifiers: usize,
    pub blocked_identifiers: usize,
    pub auth_attempts: u64,
    pub auth_successes: u64,
    pub auth_failures: u64,
    pub rate_limit_denials: u64,
    pub suspicious_events: u64,
    pub csrf_enabled: bool,
    pub headers_hardened: bool,
    pub rate_limit: RateLimitSettings,
}

#[derive(Default)]
struct Lifecycle {
    initialized: bool,
    shutdown: Option<Shutdown>,
    cleanup: Option<JoinHandle<()>>,
}

pub struct SecurityService {
    config: GatekeeperConfig,
    logger: StructuredLogger,
    events: Arc<SecurityEventLogger>,
    limiter: Arc<RateLimiter>,
    gate: AuthSecurityGate,
    csrf: Option<Arc<CsrfTokenManager>>,
    headers: SecurityHeaders,
    monitor: Arc<HealthMonitor>,
    client: SecureClient,
    secured_outbound: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl SecurityService {
    /// Wire every component. Nothing runs until [`initialize`](Self::initialize).
    pub fn new(config: GatekeeperConfig, logger: StructuredLogger) -> Self {
        let hardened = config.is_hardened();
        let events = Arc::new(SecurityEventLogger::new(logger.clone()));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let gate = AuthSecurityGate::new(limiter.clone(), events.clone(), config.rate_limit.enabled);
        let csrf = config
            .csrf
            .enabled
            .then(|| Arc::new(CsrfTokenManager::new(&config.csrf)));
        let headers = SecurityHeaders::from_config(&config.security_headers, hardened);

        let monitor = Arc::new(HealthMonitor::new(&config, logger.clone()));
        monitor.register_check(Arc::new(RateLimiterCheck::new(limiter.clone())));
        monitor.register_check(Arc::new(ConfigurationCheck::new(
            hardened,
            config.security_headers.enabled,
            config.csrf.enabled,
        )));

        let client = SecureClient::new(reqwest::Client::new(), headers.clone(), csrf.clone(), monitor.clone());

        Self {
            config,
            logger,
            events,
            limiter,
            gate,
            csrf,
            headers,
            monitor,
            client,
            secured_outbound: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// Run the startup gate and start background tasks.
    ///
    /// Fails only in hardened mode when the startup snapshot is `Unhealthy`.
    /// Calling it on an initialized service is a no-op.
    pub async fn initialize(&self, options: InitOptions) -> Result<(), StartupError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.initialized {
            return Ok(());
        }
        let hardened = self.config.is_hardened();

        if self.config.health.enabled && !options.skip_health_checks {
            let status = self.monitor.get_status().await;
            startup::verify_startup_health(&status, hardened, &self.logger)?;
        }

        if hardened {
            self.secured_outbound.store(true, Ordering::SeqCst);
            tracing::info!("Secured outbound requests installed as the default path");
        }

        if self.config.health.enabled {
            self.monitor
                .start_background_monitoring(Duration::from_millis(self.config.health.interval_ms));
        }

        let shutdown = Shutdown::new();
        if self.config.rate_limit.enabled {
            let interval = Duration::from_secs(self.config.rate_limit.cleanup_interval_secs);
            lifecycle.cleanup = Some(self.limiter.clone().spawn_cleanup(interval, shutdown.subscribe()));
        }
        lifecycle.shutdown = Some(shutdown);
        lifecycle.initialized = true;

        self.logger.info(
            "Security service initialized",
            json!({
                "environment": self.config.environment.as_str(),
                "version": self.config.service.version,
                "csrf_enabled": self.csrf.is_some(),
                "rate_limit_enabled": self.config.rate_limit.enabled,
                "health_enabled": self.config.health.enabled,
            }),
        );
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.lifecycle.lock().await.initialized
    }

    /// Stop background tasks and mark the service uninitialized.
    pub async fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if !lifecycle.initialized {
            return;
        }

        self.monitor.stop().await;
        if let Some(shutdown) = lifecycle.shutdown.take() {
            shutdown.trigger();
        }
        if let Some(handle) = lifecycle.cleanup.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Rate limit cleanup task failed");
            }
        }

        self.secured_outbound.store(false, Ordering::SeqCst);
        lifecycle.initialized = false;
        self.logger.info("Security service shut down", json!({}));
    }

    /// Fresh status computation.
    pub async fn get_system_status(&self) -> HealthStatus {
        self.monitor.get_status().await
    }

    /// Liveness view built from the cached snapshot; never probes.
    ///
    /// A service that is not running reports `error` whatever was cached.
    pub async fn get_health_endpoint(&self) -> Liveness {
        if !self.is_initialized().await {
            return Liveness::error_now();
        }
        match self.monitor.last_status() {
            Some(status) => status.liveness(),
            None => Liveness {
                status: LivenessState::Ok,
                ..Liveness::error_now()
            },
        }
    }

    /// Full diagnostic snapshot.
    pub async fn get_detailed_health(&self) -> HealthStatus {
        self.monitor.get_status().await
    }

    pub fn get_security_metrics(&self) -> SecurityMetrics {
        let counts = self.events.counts();
        SecurityMetrics {
            tracked_identifiers: self.limiter.tracked(),
            blocked_identifiers: self.limiter.blocked(),
            auth_attempts: counts.auth_attempts,
            auth_successes: counts.auth_successes,
            auth_failures: counts.auth_failures,
            rate_limit_denials: counts.rate_limit_denials,
            suspicious_events: counts.suspicious_events,
            csrf_enabled: self.csrf.is_some(),
            headers_hardened: self.headers.is_hardened(),
            rate_limit: RateLimitSettings {
                max_attempts: self.config.rate_limit.max_attempts,
                window_ms: self.config.rate_limit.window_ms,
                block_duration_ms: self.config.rate_limit.block_duration_ms,
            },
        }
    }

    /// Outbound call through the installed default path.
    ///
    /// Hardened and initialized: headers, CSRF and timing are applied.
    /// Otherwise the request is sent as given.
    pub async fn request(
        &self,
        url: &str,
        options: RequestOptions,
        session: Option<&dyn SessionStore>,
    ) -> Result<reqwest::Response, RequestError> {
        if self.secured_outbound.load(Ordering::SeqCst) {
            self.client.secure_request(url, options, session).await
        } else {
            self.client.plain_request(url, options).await
        }
    }

    pub fn is_outbound_secured(&self) -> bool {
        self.secured_outbound.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn gate(&self) -> &AuthSecurityGate {
        &self.gate
    }

    pub fn csrf(&self) -> Option<&Arc<CsrfTokenManager>> {
        self.csrf.as_ref()
    }

    pub fn client(&self) -> &SecureClient {
        &self.client
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn security_headers(&self) -> &SecurityHeaders {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DependencyConfig, Environment, ProbeMethod};
    use crate::health::OverallStatus;
    use crate::observability::LogLevel;

    fn logger() -> StructuredLogger {
        StructuredLogger::tracing(LogLevel::Error)
    }

    fn unreachable_dependency() -> DependencyConfig {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        DependencyConfig {
            name: "db".into(),
            url: format!("http://{}/", addr),
            method: ProbeMethod::Head,
        }
    }

    #[tokio::test]
    async fn test_initialize_and_shutdown_idempotent() {
        let service = SecurityService::new(GatekeeperConfig::default(), logger());
        assert!(!service.is_initialized().await);
        assert_eq!(service.get_health_endpoint().await.status, LivenessState::Error);

        service.initialize(InitOptions::default()).await.unwrap();
        service.initialize(InitOptions::default()).await.unwrap();
        assert!(service.is_initialized().await);
        assert!(service.monitor().is_monitoring());
        assert!(!service.is_outbound_secured());
        assert_eq!(service.get_health_endpoint().await.status, LivenessState::Ok);

        service.shutdown().await;
        service.shutdown().await;
        assert!(!service.is_initialized().await);
        assert!(!service.monitor().is_monitoring());
    }

    #[tokio::test]
    async fn test_liveness_is_error_after_shutdown() {
        let service = SecurityService::new(GatekeeperConfig::default(), logger());
        service.initialize(InitOptions::default()).await.unwrap();
        service.get_system_status().await;
        assert!(service.monitor().last_status().is_some());
        assert_eq!(service.get_health_endpoint().await.status, LivenessState::Ok);

        service.shutdown().await;
        assert!(service.monitor().last_status().is_some());
        assert_eq!(service.get_health_endpoint().await.status, LivenessState::Error);
    }

    #[tokio::test]
    async fn test_hardened_unhealthy_startup_fails() {
        let mut config = GatekeeperConfig {
            environment: Environment::Production,
            ..GatekeeperConfig::default()
        };
        config.health.dependencies.push(unreachable_dependency());
        config.health.probe_timeout_ms = 500;

        let service = SecurityService::new(config, logger());
        let err = service.initialize(InitOptions::default()).await.unwrap_err();
        assert!(err.to_string().contains("dependency db"));
        assert!(!service.is_initialized().await);
        assert!(!service.monitor().is_monitoring());
    }

    #[tokio::test]
    async fn test_relaxed_unhealthy_startup_proceeds() {
        let mut config = GatekeeperConfig::default();
        config.health.dependencies.push(unreachable_dependency());
        config.health.probe_timeout_ms = 500;

        let service = SecurityService::new(config, logger());
        service.initialize(InitOptions::default()).await.unwrap();
        assert_eq!(service.get_system_status().await.status, OverallStatus::Unhealthy);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_hardened_skip_health_checks_installs_secure_path() {
        let mut config = GatekeeperConfig {
            environment: Environment::Production,
            ..GatekeeperConfig::default()
        };
        config.health.dependencies.push(unreachable_dependency());

        let service = SecurityService::new(config, logger());
        service
            .initialize(InitOptions {
                skip_health_checks: true,
            })
            .await
            .unwrap();
        assert!(service.is_outbound_secured());
        assert!(service.security_headers().is_hardened());
        service.shutdown().await;
        assert!(!service.is_outbound_secured());
    }

    #[tokio::test]
    async fn test_security_metrics() {
        let service = SecurityService::new(GatekeeperConfig::default(), logger());
        let gate = service.gate();
        for _ in 0..5 {
            gate.record_attempt("ip-1", Some("user@example.com"));
            gate.record_failure("ip-1", Some("user@example.com"), "bad password");
        }
        assert!(!gate.guard_attempt("ip-1", None).allowed);

        let metrics = service.get_security_metrics();
        assert_eq!(metrics.tracked_identifiers, 1);
        assert_eq!(metrics.blocked_identifiers, 1);
        assert_eq!(metrics.auth_attempts, 5);
        assert_eq!(metrics.auth_failures, 5);
        assert_eq!(metrics.rate_limit_denials, 1);
        assert!(metrics.csrf_enabled);
        assert!(!metrics.headers_hardened);
        assert_eq!(metrics.rate_limit.max_attempts, 5);
    }
}
