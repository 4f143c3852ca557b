//! Error types for the session lifecycle core

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while coordinating a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid timeout or client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server answered with a non-success status, or the request never completed
    #[error("HTTP error: {message}")]
    Http { status: Option<u16>, message: String },

    /// No async runtime is available to drive timers or network calls
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A best-effort transport refused the request
    #[error("Transport '{transport}' unavailable: {reason}")]
    TransportUnavailable { transport: &'static str, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// HTTP status carried by the error, if the server produced one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
