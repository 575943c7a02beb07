//! Health monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Passive tracking (passive.rs):
//!     Outbound call completes
//!     → response time and error rate averages updated
//!
//! Internal checks (checks.rs):
//!     performance, rate_limiter, configuration, plus registered sources
//!
//! Dependency probes (probe.rs):
//!     HEAD/GET per configured dependency, bounded by a timeout
//!
//! Monitor (active.rs):
//!     On demand or on every tick
//!     → run checks and probes
//!     → aggregate (state.rs) and cache the snapshot
//! ```
//!
//! # Design Decisions
//! - Probe failures become `Down` statuses, never errors
//! - Liveness reads the cached snapshot and never triggers probes
//! - One background loop per monitor, cancelled through a shutdown signal

pub mod active;
pub mod checks;
pub mod passive;
pub mod probe;
pub mod state;

pub use active::HealthMonitor;
pub use checks::{CheckSource, ConfigurationCheck, PerformanceCheck, RateLimiterCheck};
pub use passive::PerformanceTracker;
pub use probe::DependencyProbe;
pub use state::{
    aggregate, CheckStatus, DependencyState, DependencyStatus, HealthStatus, Liveness,
    LivenessState, OverallStatus, PerformanceMetrics, SystemCheck,
};
