//! Health and security endpoints.
//!
//! # Responsibilities
//! - Create the Axum router for the status endpoints
//! - Wire up middleware (security headers, request ID, tracing, timeout)
//! - Serve on a listener until the shutdown future resolves
//!
//! # Routes
//! - `GET /health`: liveness from the cached snapshot, 200 or 503
//! - `GET /health/detailed`: full status, 503 when unhealthy
//! - `GET /security/metrics`: security counters and limiter state

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::health::{LivenessState, OverallStatus};
use crate::security::SecurityHeaders;
use crate::service::SecurityService;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] io::Error),
}

/// HTTP server exposing the service's status views.
pub struct HealthServer {
    router: Router,
}

impl HealthServer {
    pub fn new(service: Arc<SecurityService>) -> Self {
        let timeout = Duration::from_secs(service.config().server.request_timeout_secs);
        Self {
            router: build_router(service, timeout),
        }
    }

    /// Bind the configured address.
    pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
        TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(service: Arc<SecurityService>, timeout: Duration) -> Router {
    let headers = service.security_headers().clone();
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/health/detailed", get(detailed_handler))
        .route("/security/metrics", get(security_metrics_handler))
        .with_state(service)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(timeout)),
        )
        // Outermost, so middleware-generated responses (timeouts) get headers too.
        .layer(middleware::map_response_with_state(headers, apply_security_headers))
}

async fn apply_security_headers(State(headers): State<SecurityHeaders>, mut response: Response) -> Response {
    headers.apply(response.headers_mut());
    response
}

async fn liveness_handler(State(service): State<Arc<SecurityService>>) -> impl IntoResponse {
    let view = service.get_health_endpoint().await;
    let code = match view.status {
        LivenessState::Ok => StatusCode::OK,
        LivenessState::Error => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(view))
}

async fn detailed_handler(State(service): State<Arc<SecurityService>>) -> impl IntoResponse {
    let status = service.get_detailed_health().await;
    let code = if status.status == OverallStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(status))
}

async fn security_metrics_handler(State(service): State<Arc<SecurityService>>) -> impl IntoResponse {
    Json(service.get_security_metrics())
}
