//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide `tracing` subscriber
//! - Format leveled, filterable log records with user/session context
//! - Deliver records to a pluggable sink
//!
//! # Record Format
//! ```text
//! [2026-01-01T12:00:00.000Z] WARN [User:u-1][Session:s-9] message {"key":"value"}
//! ```
//! User and session segments are omitted when unset, the JSON context when
//! empty.
//!
//! # Design Decisions
//! - Records below the minimum level are dropped before formatting
//! - Every context passes through the redaction policy in redact.rs
//! - Default sink forwards to `tracing`, so one subscriber sees everything

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::redact::redact_map;

/// Target used when records are forwarded to `tracing`.
pub const AUDIT_TARGET: &str = "gatekeeper::audit";

/// Severity of a log record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a level name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// One emitted log event.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub context: Map<String, Value>,
}

impl LogRecord {
    /// Render the record as a single line.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "[{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level
        );
        if self.user_id.is_some() || self.session_id.is_some() {
            line.push(' ');
            if let Some(user) = &self.user_id {
                line.push_str(&format!("[User:{}]", user));
            }
            if let Some(session) = &self.session_id {
                line.push_str(&format!("[Session:{}]", session));
            }
        }
        line.push(' ');
        line.push_str(&self.message);
        if !self.context.is_empty() {
            if let Ok(json) = serde_json::to_string(&self.context) {
                line.push(' ');
                line.push_str(&json);
            }
        }
        line
    }
}

/// Destination for formatted records.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

/// Forwards records to the `tracing` subscriber at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let line = record.to_line();
        match record.level {
            LogLevel::Debug => tracing::debug!(target: AUDIT_TARGET, "{}", line),
            LogLevel::Info => tracing::info!(target: AUDIT_TARGET, "{}", line),
            LogLevel::Warn => tracing::warn!(target: AUDIT_TARGET, "{}", line),
            LogLevel::Error => tracing::error!(target: AUDIT_TARGET, "{}", line),
        }
    }
}

/// Keeps records in memory. Used by tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rendered lines, in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.records().iter().map(LogRecord::to_line).collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }
}

/// Leveled logger producing [`LogRecord`]s.
///
/// Cheap to clone; clones share the sink. `with_user` and `with_session`
/// return handles that stamp their identifiers onto every record.
#[derive(Clone)]
pub struct StructuredLogger {
    min_level: LogLevel,
    sink: Arc<dyn LogSink>,
    user_id: Option<String>,
    session_id: Option<String>,
}

impl std::fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("min_level", &self.min_level)
            .field("user_id", &self.user_id)
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl StructuredLogger {
    pub fn new(min_level: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self {
            min_level,
            sink,
            user_id: None,
            session_id: None,
        }
    }

    /// Logger that forwards to the `tracing` subscriber.
    pub fn tracing(min_level: LogLevel) -> Self {
        Self::new(min_level, Arc::new(TracingSink))
    }

    pub fn with_user(&self, user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..self.clone()
        }
    }

    pub fn with_session(&self, session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..self.clone()
        }
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Emit a record. Non-object contexts are wrapped under `"value"`.
    pub fn log(&self, level: LogLevel, message: &str, context: Value) {
        if !self.enabled(level) {
            return;
        }
        let mut context = match context {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        redact_map(&mut context);

        let record = LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            context,
        };
        self.sink.emit(&record);
    }

    pub fn debug(&self, message: &str, context: Value) {
        self.log(LogLevel::Debug, message, context);
    }

    pub fn info(&self, message: &str, context: Value) {
        self.log(LogLevel::Info, message, context);
    }

    pub fn warn(&self, message: &str, context: Value) {
        self.log(LogLevel::Warn, message, context);
    }

    pub fn error(&self, message: &str, context: Value) {
        self.log(LogLevel::Error, message, context);
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the configured level. Fails if a subscriber is
/// already installed.
pub fn init_subscriber(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let level = config
        .log_level
        .parse::<LogLevel>()
        .unwrap_or(LogLevel::Info)
        .directive();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gatekeeper={level},tower_http={level}")));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    }
}
