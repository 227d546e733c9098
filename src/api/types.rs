//! API request and response types.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::OverseerError;

/// Body for writing a string value.
#[derive(Debug, Clone, Deserialize)]
pub struct PutValueRequest {
    pub value: String,
}

/// A single session value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueResponse {
    pub key: String,
    pub value: String,
}

/// Identifier of the current session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdResponse {
    pub session_id: String,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "NO_SESSION").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn no_session() -> Self {
        Self::new("NO_SESSION", "No active session")
    }

    pub fn key_not_found(key: &str) -> Self {
        Self::new("KEY_NOT_FOUND", format!("Key '{}' not found in session", key))
    }

    pub fn unsupported(operation: &str) -> Self {
        Self::new(
            "UNSUPPORTED",
            format!("{} is not supported by this session backend", operation),
        )
    }

    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::new("INVALID_SESSION", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Status code and body for a session error.
    pub fn from_error(err: &OverseerError) -> (StatusCode, Self) {
        match err {
            OverseerError::NoSession => (StatusCode::NOT_FOUND, Self::no_session()),
            OverseerError::NoMapKey(key) => (StatusCode::NOT_FOUND, Self::key_not_found(key)),
            OverseerError::Unsupported(op) => (StatusCode::NOT_IMPLEMENTED, Self::unsupported(op)),
            OverseerError::Decode(_) | OverseerError::Crypto | OverseerError::Json(_) => (
                StatusCode::BAD_REQUEST,
                Self::invalid_session("Session payload could not be used")
                    .with_details(err.to_string()),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Self::internal_error(err.to_string()),
            ),
        }
    }
}
