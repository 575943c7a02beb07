//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Login attempt:
//!     → auth_gate.rs (guard, record outcome)
//!         → rate_limit.rs (sliding window per identifier)
//!         → events.rs (security events via the structured logger)
//!
//! State-changing outbound request:
//!     → csrf.rs (attach the session's current token)
//!     → headers.rs (security header set)
//!
//! Untrusted input:
//!     → sanitize.rs (HTML, email, filename, URL, JSON)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: escaping plus payload neutralization
//! - Every operation is total; denial is a value, not an error
//! - No trust in client input

pub mod auth_gate;
pub mod csrf;
pub mod events;
pub mod headers;
pub mod rate_limit;
pub mod sanitize;

pub use auth_gate::AuthSecurityGate;
pub use csrf::{CsrfToken, CsrfTokenManager, MemorySessionStore, SessionStore};
pub use events::{SecurityEvent, SecurityEventCounts, SecurityEventKind, SecurityEventLogger};
pub use headers::SecurityHeaders;
pub use rate_limit::{RateLimitDecision, RateLimiter};
