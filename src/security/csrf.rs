//! Per-session anti-forgery tokens.
//!
//! # Responsibilities
//! - Mint a token lazily on first use and keep it in the session store
//! - Validate candidates against the one current token
//! - Rotate tokens with no grace overlap
//! - Attach the token to state-changing outbound requests
//!
//! # Design Decisions
//! - Tokens are opaque hex strings from the OS CSPRNG, no embedded expiry
//! - Validity is solely "equals the currently stored value"
//! - A manager-wide mutex makes get-or-mint and rotate atomic

use std::sync::{Arc, Mutex, MutexGuard};

use axum::http::{HeaderName, HeaderValue, Method};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::CsrfConfig;
use crate::observability::metrics;

const DEFAULT_HEADER: &str = "x-csrf-token";

/// Key/value storage scoped to one user session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

/// In-process session store.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<DashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.inner.insert(key.to_string(), value);
    }
}

/// The current anti-forgery token of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
}

/// Methods that must carry a token.
pub fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Issues, validates and rotates tokens kept in a [`SessionStore`].
#[derive(Debug)]
pub struct CsrfTokenManager {
    header_name: HeaderName,
    session_key: String,
    token_bytes: usize,
    lock: Mutex<()>,
}

impl CsrfTokenManager {
    pub fn new(config: &CsrfConfig) -> Self {
        let header_name = HeaderName::try_from(config.header_name.as_str())
            .unwrap_or_else(|_| HeaderName::from_static(DEFAULT_HEADER));
        Self {
            header_name,
            session_key: config.session_key.clone(),
            token_bytes: config.token_bytes.max(1),
            lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn generate(&self) -> CsrfToken {
        let mut bytes = vec![0u8; self.token_bytes];
        OsRng.fill_bytes(&mut bytes);
        CsrfToken {
            value: hex::encode(bytes),
            issued_at: Utc::now(),
        }
    }

    fn load(&self, session: &dyn SessionStore) -> Option<CsrfToken> {
        let raw = session.get(&self.session_key)?;
        match serde_json::from_str::<CsrfToken>(&raw) {
            Ok(token) if !token.value.is_empty() => Some(token),
            _ => {
                tracing::debug!("Discarding unreadable CSRF token from session store");
                None
            }
        }
    }

    fn store(&self, session: &dyn SessionStore, token: &CsrfToken) {
        match serde_json::to_string(token) {
            Ok(raw) => session.set(&self.session_key, raw),
            Err(e) => tracing::error!(error = %e, "Failed to serialize CSRF token"),
        }
    }

    /// Current token of the session, minting one if none exists.
    pub fn get_token(&self, session: &dyn SessionStore) -> CsrfToken {
        let _guard = self.lock();
        if let Some(token) = self.load(session) {
            return token;
        }
        let token = self.generate();
        self.store(session, &token);
        tracing::debug!("Issued new CSRF token");
        token
    }

    /// True iff `candidate` equals the currently stored token.
    pub fn validate_token(&self, session: &dyn SessionStore, candidate: &str) -> bool {
        let valid = !candidate.is_empty() && {
            let _guard = self.lock();
            self.load(session)
                .is_some_and(|t| constant_time_eq(t.value.as_bytes(), candidate.as_bytes()))
        };
        metrics::record_csrf_validation(valid);
        valid
    }

    /// Replace the stored token; the previous one is invalid once this returns.
    pub fn refresh_token(&self, session: &dyn SessionStore) -> CsrfToken {
        let _guard = self.lock();
        let token = self.generate();
        self.store(session, &token);
        tracing::debug!("Rotated CSRF token");
        token
    }

    /// Add the token header to state-changing requests; others pass untouched.
    pub fn attach_to_request(
        &self,
        mut request: reqwest::Request,
        session: &dyn SessionStore,
    ) -> reqwest::Request {
        if !is_state_changing(request.method()) {
            return request;
        }
        let token = self.get_token(session);
        match HeaderValue::from_str(&token.value) {
            Ok(value) => {
                request.headers_mut().insert(self.header_name.clone(), value);
            }
            Err(e) => tracing::error!(error = %e, "CSRF token is not a valid header value"),
        }
        request
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }
}
