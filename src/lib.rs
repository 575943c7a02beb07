//! Security and health-monitoring middleware.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod service;

pub use config::schema::GatekeeperConfig;
pub use http::HealthServer;
pub use lifecycle::Shutdown;
pub use service::{InitOptions, SecurityService};
