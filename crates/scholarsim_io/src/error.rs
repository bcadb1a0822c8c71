//! Error types for scholarsim_io.
//!
//! Covers the cache gateway, the key-value backends and the relational
//! factor source. Absence of a key is never an error here; it is `Ok(None)`.

use thiserror::Error;

/// Main error type for store and source operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend cannot be reached at all
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time
    #[error("Store timed out after {after_ms} ms during {operation}")]
    Timeout { operation: String, after_ms: u64 },

    /// The backend answered with an error
    #[error("Backend error: {0}")]
    Backend(String),

    /// A versioned write lost against a concurrent writer
    #[error("Version conflict on key {key}")]
    Conflict { key: String },

    /// Stored bytes that cannot be decoded into a cache entry
    #[error("Corrupt entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Compression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<StoreError>,
    },
}

/// Result type alias for scholarsim_io operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    #[must_use]
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }

    #[must_use]
    pub fn timeout<S: Into<String>>(operation: S, after_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after_ms,
        }
    }

    #[must_use]
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }

    #[must_use]
    pub fn conflict<S: Into<String>>(key: S) -> Self {
        Self::Conflict { key: key.into() }
    }

    #[must_use]
    pub fn corrupt<K: Into<String>, R: Into<String>>(key: K, reason: R) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    #[must_use]
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }

    /// Wraps an error with additional context.
    #[must_use]
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any context wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &StoreError {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.root_cause(), Self::Conflict { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
