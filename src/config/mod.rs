//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatekeeperConfig (validated, immutable)
//!     → passed by reference into each component's constructor
//! ```
//!
//! # Design Decisions
//! - Config is consumed once at construction; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CsrfConfig, DependencyConfig, Environment, GatekeeperConfig, HealthConfig, LogFormat,
    ObservabilityConfig, ProbeMethod, RateLimitConfig, SecurityHeadersConfig, ServerConfig,
    ServiceConfig,
};
pub use validation::{validate_config, ValidationError};
