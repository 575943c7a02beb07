//! Dependency probing.
//!
//! # Responsibilities
//! - Issue one lightweight request per configured dependency
//! - Classify the outcome as Up, Degraded or Down
//!
//! # Classification
//! ```text
//! 2xx / 3xx             → Up
//! 405 on HEAD           → retried once as GET
//! other 4xx / 5xx       → Degraded
//! transport error       → Down (error message kept)
//! timeout               → Down
//! ```
//!
//! Probing never fails: every failure mode is encoded in the returned status.

use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use reqwest::{Client, Method, StatusCode};
use tokio::time;

use crate::config::{DependencyConfig, ProbeMethod};
use crate::health::state::{DependencyState, DependencyStatus};
use crate::observability::metrics;

const USER_AGENT: &str = "gatekeeper-health-check";

pub struct DependencyProbe {
    client: Client,
    timeout: Duration,
}

impl DependencyProbe {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build probe client, using defaults");
                Client::new()
            });
        Self { client, timeout }
    }

    /// Use a preconfigured client.
    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe every dependency concurrently. Order matches the input.
    pub async fn check_all(&self, dependencies: &[DependencyConfig]) -> Vec<DependencyStatus> {
        join_all(dependencies.iter().map(|dep| self.check(dep))).await
    }

    pub async fn check(&self, dependency: &DependencyConfig) -> DependencyStatus {
        let started = Instant::now();
        let method = match dependency.method {
            ProbeMethod::Head => Method::HEAD,
            ProbeMethod::Get => Method::GET,
        };

        let mut outcome = self.send(method.clone(), &dependency.url).await;
        if method == Method::HEAD && matches!(outcome, Ok(StatusCode::METHOD_NOT_ALLOWED)) {
            tracing::debug!(dependency = %dependency.name, "HEAD not allowed, retrying with GET");
            outcome = self.send(Method::GET, &dependency.url).await;
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let (state, response_time_ms, error) = match outcome {
            Ok(status) if status.is_success() || status.is_redirection() => {
                (DependencyState::Up, Some(elapsed_ms), None)
            }
            Ok(status) => {
                tracing::warn!(dependency = %dependency.name, status = %status, "Dependency check returned error status");
                (
                    DependencyState::Degraded,
                    Some(elapsed_ms),
                    Some(format!("unexpected status {}", status.as_u16())),
                )
            }
            Err(message) => {
                tracing::warn!(dependency = %dependency.name, error = %message, "Dependency check failed");
                (DependencyState::Down, None, Some(message))
            }
        };

        metrics::record_dependency_status(&dependency.name, state.metric_value());

        DependencyStatus {
            name: dependency.name.clone(),
            status: state,
            response_time_ms,
            last_checked: Utc::now(),
            error,
        }
    }

    async fn send(&self, method: Method, url: &str) -> Result<StatusCode, String> {
        let request = self.client.request(method, url).send();
        match time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => Ok(response.status()),
            Ok(Err(e)) if e.is_timeout() => Err(self.timeout_message()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(self.timeout_message()),
        }
    }

    fn timeout_message(&self) -> String {
        format!("timed out after {}ms", self.timeout.as_millis())
    }
}
