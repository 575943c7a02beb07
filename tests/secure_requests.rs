//! Outbound wrapping and the health HTTP surface.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use serde_json::Value;

use gatekeeper::config::{DependencyConfig, Environment, GatekeeperConfig, ProbeMethod};
use gatekeeper::http::{build_router, RequestError, RequestOptions};
use gatekeeper::observability::{LogLevel, StructuredLogger};
use gatekeeper::security::{MemorySessionStore, SessionStore};
use gatekeeper::{InitOptions, SecurityService};

use common::{start_mock_backend, start_programmable_backend, unused_addr};

fn service(config: GatekeeperConfig) -> Arc<SecurityService> {
    Arc::new(SecurityService::new(config, StructuredLogger::tracing(LogLevel::Error)))
}

fn hardened() -> GatekeeperConfig {
    GatekeeperConfig {
        environment: Environment::Production,
        ..GatekeeperConfig::default()
    }
}

#[tokio::test]
async fn test_state_changing_request_carries_csrf_and_headers() {
    let backend = start_mock_backend("created").await;
    let service = service(hardened());
    let session = MemorySessionStore::new();
    let csrf = service.csrf().unwrap().clone();

    let response = service
        .client()
        .secure_request(&backend.url("/orders"), RequestOptions::new(Method::POST).body("{}"), Some(&session))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen = &backend.requests()[0];
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.body, b"{}");
    let token = seen.header("x-csrf-token").expect("csrf header");
    assert!(csrf.validate_token(&session, token));
    assert_eq!(seen.header("x-frame-options"), Some("DENY"));
    assert_eq!(seen.header("x-content-type-options"), Some("nosniff"));
    assert!(seen.header("strict-transport-security").is_some());

    let perf = service.monitor().performance();
    assert_eq!(perf.samples(), 1);
    assert_eq!(perf.snapshot().error_rate_ewma, 0.0);
}

#[tokio::test]
async fn test_safe_request_has_no_csrf_token() {
    let backend = start_mock_backend("ok").await;
    let service = service(GatekeeperConfig::default());
    let session = MemorySessionStore::new();

    service
        .client()
        .secure_request(&backend.url("/items"), RequestOptions::new(Method::GET), Some(&session))
        .await
        .unwrap();

    let seen = &backend.requests()[0];
    assert!(seen.header("x-csrf-token").is_none());
    assert!(seen.header("x-xss-protection").is_some());
    assert!(seen.header("content-security-policy").is_none());
    assert!(session.get("csrf_token").is_none());
}

#[tokio::test]
async fn test_failures_are_recorded() {
    let failing = start_programmable_backend(|_| async { (500, "boom".to_string()) }).await;
    let service = service(GatekeeperConfig::default());
    let client = service.client();

    let response = client
        .secure_request(&failing.url("/"), RequestOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    let err = client
        .secure_request(&format!("http://{}/", unused_addr()), RequestOptions::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::Transport(_)));

    let perf = service.monitor().performance();
    assert_eq!(perf.samples(), 2);
    assert!((perf.snapshot().error_rate_ewma - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_default_path_follows_hardening() {
    let backend = start_mock_backend("ok").await;

    let relaxed = service(GatekeeperConfig::default());
    relaxed.initialize(InitOptions::default()).await.unwrap();
    relaxed
        .request(&backend.url("/a"), RequestOptions::new(Method::POST), None)
        .await
        .unwrap();
    assert!(backend.requests()[0].header("x-frame-options").is_none());
    assert_eq!(relaxed.monitor().performance().samples(), 0);
    relaxed.shutdown().await;

    let strict = service(hardened());
    strict.initialize(InitOptions::default()).await.unwrap();
    strict
        .request(&backend.url("/b"), RequestOptions::new(Method::GET), None)
        .await
        .unwrap();
    assert_eq!(backend.requests()[1].header("x-frame-options"), Some("DENY"));
    assert_eq!(strict.monitor().performance().samples(), 1);
    strict.shutdown().await;
}

async fn serve(service: Arc<SecurityService>) -> String {
    serve_with_timeout(service, Duration::from_secs(5)).await
}

async fn serve_with_timeout(service: Arc<SecurityService>, timeout: Duration) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(service, timeout);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_endpoints() {
    let service = service(GatekeeperConfig::default());
    service.initialize(InitOptions::default()).await.unwrap();
    let base = serve(service.clone()).await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());

    let res = client
        .get(format!("{}/health/detailed", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "development");
    let checks: Vec<&str> = body["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(checks, vec!["performance", "rate_limiter", "configuration"]);

    let res = client
        .get(format!("{}/security/metrics", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tracked_identifiers"], 0);
    assert_eq!(body["rate_limit"]["max_attempts"], 5);

    service.shutdown().await;
}

#[tokio::test]
async fn test_unhealthy_dependency_reports_503() {
    let mut config = GatekeeperConfig::default();
    config.health.probe_timeout_ms = 500;
    config.health.dependencies.push(DependencyConfig {
        name: "db".into(),
        url: format!("http://{}/", unused_addr()),
        method: ProbeMethod::Head,
    });
    let service = service(config);
    service.initialize(InitOptions::default()).await.unwrap();
    let base = serve(service.clone()).await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");

    let res = client
        .get(format!("{}/health/detailed", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["dependencies"][0]["status"], "down");

    service.shutdown().await;
}

#[tokio::test]
async fn test_timed_out_request_keeps_security_headers() {
    let slow = start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(800)).await;
        (200, "late".to_string())
    })
    .await;
    let mut config = GatekeeperConfig::default();
    config.health.probe_timeout_ms = 2_000;
    config.health.dependencies.push(DependencyConfig {
        name: "slow".into(),
        url: slow.url("/"),
        method: ProbeMethod::Get,
    });
    let service = service(config);
    let base = serve_with_timeout(service, Duration::from_millis(100)).await;

    let res = reqwest::get(format!("{}/health/detailed", base)).await.unwrap();
    assert_eq!(res.status(), 408);
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert!(res.headers().contains_key("x-request-id"));
}
