//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (client.rs):
//!     caller → SecureClient
//!         → security headers, CSRF token for state-changing methods
//!         → reqwest
//!         → timing recorded into the health monitor
//!
//! Inbound (server.rs):
//!     load balancer / operator → Axum router
//!         → request ID, tracing, timeout, security headers
//!         → SecurityService status views
//! ```

pub mod client;
pub mod server;

pub use client::{RequestError, RequestOptions, SecureClient};
pub use server::{build_router, HealthServer, ServerError};
