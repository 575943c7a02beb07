//! Secured outbound HTTP.
//!
//! # Responsibilities
//! - Stamp the security header set on every outbound request
//! - Attach the session's CSRF token to state-changing requests
//! - Feed latency and outcome into the health monitor, whatever the outcome
//!
//! # Design Decisions
//! - Timing is owned by a drop guard, so early returns and cancellation
//!   still record the call
//! - A transport failure or a 5xx response counts as an error

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method};
use thiserror::Error;
use url::Url;

use crate::health::HealthMonitor;
use crate::observability::metrics;
use crate::security::{CsrfTokenManager, SecurityHeaders, SessionStore};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Per-call options for [`SecureClient::secure_request`].
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Records one outbound call into the health monitor when dropped.
struct RequestTimer<'a> {
    monitor: &'a HealthMonitor,
    started: Instant,
    success: bool,
}

impl<'a> RequestTimer<'a> {
    fn start(monitor: &'a HealthMonitor) -> Self {
        Self {
            monitor,
            started: Instant::now(),
            success: false,
        }
    }

    fn succeed(&mut self) {
        self.success = true;
    }
}

impl Drop for RequestTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        self.monitor.record_response_time(elapsed.as_secs_f64() * 1000.0);
        if self.success {
            self.monitor.record_success();
        } else {
            self.monitor.record_error();
        }
        metrics::record_outbound_request(self.success, elapsed);
    }
}

/// Outbound client wrapping every call with headers, CSRF and timing.
#[derive(Clone)]
pub struct SecureClient {
    client: reqwest::Client,
    headers: SecurityHeaders,
    csrf: Option<Arc<CsrfTokenManager>>,
    monitor: Arc<HealthMonitor>,
}

impl SecureClient {
    pub fn new(
        client: reqwest::Client,
        headers: SecurityHeaders,
        csrf: Option<Arc<CsrfTokenManager>>,
        monitor: Arc<HealthMonitor>,
    ) -> Self {
        Self {
            client,
            headers,
            csrf,
            monitor,
        }
    }

    /// Build the request without sending it.
    pub fn prepare(
        &self,
        url: &str,
        options: RequestOptions,
        session: Option<&dyn SessionStore>,
    ) -> Result<reqwest::Request, RequestError> {
        let parsed = Url::parse(url).map_err(|e| RequestError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut request = reqwest::Request::new(options.method, parsed);
        *request.headers_mut() = options.headers;
        self.headers.apply(request.headers_mut());
        if let Some(body) = options.body {
            *request.body_mut() = Some(body.into());
        }
        if let Some(timeout) = options.timeout {
            *request.timeout_mut() = Some(timeout);
        }

        if let (Some(csrf), Some(session)) = (&self.csrf, session) {
            request = csrf.attach_to_request(request, session);
        }
        Ok(request)
    }

    /// Send a request through the security wrapper.
    ///
    /// The call is recorded into the health monitor even when it fails.
    pub async fn secure_request(
        &self,
        url: &str,
        options: RequestOptions,
        session: Option<&dyn SessionStore>,
    ) -> Result<reqwest::Response, RequestError> {
        let mut timer = RequestTimer::start(&self.monitor);
        let request = self.prepare(url, options, session)?;
        let method = request.method().clone();

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %method, url, error = %e, "Outbound request failed");
                return Err(RequestError::Transport(e));
            }
        };

        if response.status().is_server_error() {
            tracing::warn!(method = %method, url, status = %response.status(), "Outbound request returned server error");
        } else {
            timer.succeed();
        }
        Ok(response)
    }

    /// Send without headers, CSRF or timing.
    pub async fn plain_request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<reqwest::Response, RequestError> {
        let parsed = Url::parse(url).map_err(|e| RequestError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut request = self.client.request(options.method, parsed).headers(options.headers);
        if let Some(body) = options.body {
            request = request.body(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        Ok(request.send().await?)
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn security_headers(&self) -> &SecurityHeaders {
        &self.headers
    }
}
