//! Error types
//!
//! Only [`CollectError`] aborts an invocation. Fetch and store errors are
//! absorbed into per-site counters by the collector.

use std::fmt;
use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Field;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSS selector `{selector}` for field {field}")]
    InvalidSelector { field: Field, selector: String },

    #[error("invalid pattern `{pattern}` for field {field}: {source}")]
    InvalidPattern {
        field: Field,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{name} bounds are inverted: min {min} > max {max}")]
    InvalidBounds {
        name: &'static str,
        min: Decimal,
        max: Decimal,
    },

    #[error("pacing delay is inverted: min {min_ms}ms > max {max_ms}ms")]
    InvalidPacing { min_ms: u64, max_ms: u64 },

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("site `{0}` is configured more than once")]
    DuplicateSite(String),
}

/// Low-level transport failure (DNS, connect, timeout, body read)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Last thing that went wrong before the fetcher gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    Status(u16),
    Transport(String),
}

impl FetchErrorKind {
    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchErrorKind::Status(403))
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Status(403) => write!(f, "HTTP 403 (blocked)"),
            FetchErrorKind::Status(status) => write!(f, "HTTP {status}"),
            FetchErrorKind::Transport(message) => write!(f, "transport error: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetching {url} failed after {attempts} attempt(s): {last}")]
pub struct FetchFailure {
    pub url: String,
    pub attempts: u32,
    pub last: FetchErrorKind,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("unknown site `{0}` in site filter")]
    UnknownSite(String),

    #[error("site filter is empty")]
    EmptySiteFilter,

    #[error(transparent)]
    Config(#[from] ConfigError),
}
