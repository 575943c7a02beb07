//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (leveled records, one line per event)
//!     → redact.rs (PII policy applied to every context)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → tracing subscriber (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured context travels as JSON so it survives any sink
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod redact;

pub use logging::{LogLevel, LogRecord, LogSink, MemorySink, StructuredLogger, TracingSink};
