//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Startup health snapshot → fail fast when hardened and unhealthy
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed background task exits its loop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → daemon begins graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::StartupError;
