//! Error types for session-overseer.

use thiserror::Error;

/// Main error type for session operations.
///
/// `NoSession` and `NoMapKey` are ordinary outcomes on the read path, not
/// failures. Check for them with [`OverseerError::is_no_session`] and
/// [`OverseerError::is_no_map_key`] instead of matching on identity.
#[derive(Error, Debug)]
pub enum OverseerError {
    /// The session cookie or backend entry is absent, expired or malformed.
    #[error("no session")]
    NoSession,

    /// The requested key is missing from an otherwise valid session.
    #[error("no such key in session: {0}")]
    NoMapKey(String),

    /// A client-held payload could not be decoded.
    #[error("failed to decode session payload: {0}")]
    Decode(String),

    /// Authenticated encryption or decryption failed.
    #[error("session payload failed authentication")]
    Crypto,

    /// Disk backend I/O failure.
    #[error("disk storer {op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Remote key-value backend failure.
    #[error("redis storer {op} failed: {source}")]
    Redis {
        op: &'static str,
        #[source]
        source: redis::RedisError,
    },

    /// Session envelope (de)serialization failure.
    #[error("session JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid construction-time configuration.
    #[error("invalid session configuration: {0}")]
    Config(String),

    /// Operation not supported by this overseer.
    #[error("{0} is not supported by this overseer")]
    Unsupported(&'static str),

    /// A cookie could not be turned into a header value.
    #[error("invalid cookie header: {0}")]
    Header(String),

    /// The HTTP server failed to bind or serve.
    #[error("server error: {0}")]
    Server(#[source] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl OverseerError {
    /// True when the error means "there is no session".
    pub fn is_no_session(&self) -> bool {
        matches!(self, Self::NoSession)
    }

    /// True when the error means "the key is not in the session".
    pub fn is_no_map_key(&self) -> bool {
        matches!(self, Self::NoMapKey(_))
    }

    pub(crate) fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { op, source }
    }

    pub(crate) fn redis(op: &'static str) -> impl FnOnce(redis::RedisError) -> Self {
        move |source| Self::Redis { op, source }
    }
}

/// Returns true if `err` signals a missing or expired session.
pub fn is_no_session(err: &OverseerError) -> bool {
    err.is_no_session()
}

/// Returns true if `err` signals a missing key inside a session.
pub fn is_no_map_key(err: &OverseerError) -> bool {
    err.is_no_map_key()
}

/// Convenience Result type for session operations.
pub type Result<T> = std::result::Result<T, OverseerError>;
