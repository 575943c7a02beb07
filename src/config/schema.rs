//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the security and health service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Deployment environment. `Production` enables hardened mode.
    pub environment: Environment,

    /// Service identity reported by the health endpoints.
    pub service: ServiceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Authentication rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Health monitoring and dependency probes.
    pub health: HealthConfig,

    /// Security headers applied to outbound and served responses.
    pub security_headers: SecurityHeadersConfig,

    /// Bind settings for the health endpoints.
    pub server: ServerConfig,
}

impl GatekeeperConfig {
    /// Hardened mode is tied to the production environment.
    pub fn is_hardened(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name used in log lines and metrics.
    pub name: String,

    /// Version reported by the detailed health endpoint.
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "gatekeeper".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Minimum log level (debug, info, warn, error).
    pub log_level: String,

    /// Output format for the process subscriber.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Sliding-window rate limiting for authentication attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting of login attempts.
    pub enabled: bool,

    /// Attempts allowed inside one window before the identifier is blocked.
    pub max_attempts: u32,

    /// Window length in milliseconds, measured from the first attempt.
    pub window_ms: u64,

    /// How long a blocked identifier stays blocked, in milliseconds.
    pub block_duration_ms: u64,

    /// Interval between sweeps of expired records, in seconds.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            window_ms: 15 * 60 * 1000,
            block_duration_ms: 30 * 60 * 1000,
            cleanup_interval_secs: 300,
        }
    }
}

/// Anti-forgery token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Attach and validate tokens on state-changing requests.
    pub enabled: bool,

    /// Header carrying the token on outbound requests.
    pub header_name: String,

    /// Key under which the token is kept in the session store.
    pub session_key: String,

    /// Number of random bytes per token (hex-encoded, so twice as many chars).
    pub token_bytes: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: "X-CSRF-Token".to_string(),
            session_key: "csrf_token".to_string(),
            token_bytes: 32,
        }
    }
}

/// Health monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Run the background monitor.
    pub enabled: bool,

    /// Background recomputation interval in milliseconds.
    pub interval_ms: u64,

    /// Timeout for each dependency probe in milliseconds.
    pub probe_timeout_ms: u64,

    /// Average response time above which performance is a warning.
    pub response_time_warn_ms: f64,

    /// Average response time above which performance is critical.
    pub response_time_critical_ms: f64,

    /// Error rate above which performance is a warning.
    pub error_rate_warn: f64,

    /// Error rate above which performance is critical.
    pub error_rate_critical: f64,

    /// External dependencies probed on every recomputation.
    pub dependencies: Vec<DependencyConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            probe_timeout_ms: 5_000,
            response_time_warn_ms: 1_000.0,
            response_time_critical_ms: 5_000.0,
            error_rate_warn: 0.05,
            error_rate_critical: 0.25,
            dependencies: Vec::new(),
        }
    }
}

/// A single external dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    /// Name reported in health output.
    pub name: String,

    /// Endpoint to probe (http or https).
    pub url: String,

    /// Probe method.
    #[serde(default)]
    pub method: ProbeMethod,
}

/// Lightweight methods a probe may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    #[default]
    Head,
    Get,
}

/// Security header policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityHeadersConfig {
    /// Apply security headers at all.
    pub enabled: bool,

    /// Content-Security-Policy value (hardened mode only).
    pub content_security_policy: String,

    /// HSTS max-age in seconds (hardened mode only).
    pub hsts_max_age_secs: u64,

    /// Permissions-Policy value (hardened mode only).
    pub permissions_policy: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_security_policy: "default-src 'self'; frame-ancestors 'none'; object-src 'none'"
                .to_string(),
            hsts_max_age_secs: 31_536_000,
            permissions_policy: "camera=(), microphone=(), geolocation=()".to_string(),
        }
    }
}

/// Health endpoint server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8090").
    pub bind_address: String,

    /// Request timeout for the health endpoints in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8090".to_string(),
            request_timeout_secs: 10,
        }
    }
}
