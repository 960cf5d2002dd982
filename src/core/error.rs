//! Unified error handling for pingcompose
//!
//! Backend failures are absorbed into fallback results at the call boundary,
//! so most of these variants only ever reach a log line. `Validation` and
//! `Internal` are the two kinds that escape the orchestrator.

use std::fmt;

use http::StatusCode;

/// Unified error types for the gateway
#[derive(Debug)]
pub enum ProxyError {
    /// Configuration-related errors
    Configuration(String),

    /// Client input rejected before any backend work
    Validation(String),

    /// Backend transport failures (connect, send, read)
    Transport(String),

    /// Backend answered with a non-success status
    UpstreamStatus(u16),

    /// Backend payload could not be decoded
    Decode(String),

    /// Internal system errors
    Internal(String),
}

impl ProxyError {
    /// HTTP status the downstream client should see for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
            ProxyError::Transport(_) | ProxyError::UpstreamStatus(_) | ProxyError::Decode(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            ProxyError::Validation(msg) => write!(f, "{msg}"),
            ProxyError::Transport(msg) => write!(f, "Backend transport error: {msg}"),
            ProxyError::UpstreamStatus(code) => write!(f, "Backend returned status {code}"),
            ProxyError::Decode(msg) => write!(f, "Backend payload decode failed: {msg}"),
            ProxyError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProxyError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ProxyError::UpstreamStatus(status.as_u16())
        } else {
            ProxyError::Transport(err.to_string())
        }
    }
}

impl From<ProxyError> for Box<pingora_error::Error> {
    fn from(err: ProxyError) -> Self {
        pingora_error::Error::explain(
            pingora_error::ErrorType::HTTPStatus(err.status().as_u16()),
            err.to_string(),
        )
    }
}

/// Result type alias for proxy operations
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> ProxyResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> ProxyResult<T> {
        self.map_err(|e| ProxyError::Internal(format!("{context}: {e}")))
    }
}
