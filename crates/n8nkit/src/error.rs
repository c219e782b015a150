//! Error types for n8n API operations.
//!
//! Errors are categorized to enable retry logic for idempotent calls and
//! appropriate user feedback. At the adapter boundary they are converted
//! into [`RemoteError`] for the reconciliation engine.

use declarative::RemoteError;
use std::fmt;

/// Result type alias for n8n API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors and overloaded servers (transient, retryable).
    Network,
    /// Missing or rejected API key.
    Auth,
    /// Entity not found.
    NotFound,
    /// Request rejected by the API.
    Rejected,
    /// Unusable response body.
    Format,
    /// Invalid client configuration or request.
    Config,
    /// Cancelled or out of time.
    Interrupted,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Not found",
            Self::Rejected => "Request rejected",
            Self::Format => "Invalid response format",
            Self::Config => "Invalid configuration",
            Self::Interrupted => "Interrupted",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the n8n instance is reachable and try again",
            Self::Auth => "Check the API key (N8N_API_TOKEN) and that the public API is enabled",
            Self::NotFound => "Refresh state; the entity may have been deleted",
            Self::Rejected => "Check the declared attribute values",
            Self::Format => "The n8n version may not be supported",
            Self::Config => "Check the [provider] section of the manifest",
            Self::Interrupted => "Retry with a longer timeout",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during n8n API operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed before the request was sent.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The request cannot be built from the given attributes.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The kind is not served by this adapter.
    #[error("unsupported resource kind: {0}")]
    UnsupportedKind(String),
}

impl Error {
    /// Create an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                404 => ErrorCategory::NotFound,
                429 | 500.. => ErrorCategory::Network,
                _ => ErrorCategory::Rejected,
            },
            Error::Network(_) | Error::Timeout => ErrorCategory::Network,
            Error::Cancelled | Error::DeadlineExceeded => ErrorCategory::Interrupted,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::InvalidRequest(_) | Error::UnsupportedKind(_) => ErrorCategory::Config,
            Error::Config(_) => ErrorCategory::Config,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the API reported the entity as absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::http(code, format!("HTTP {code}")),
            ureq::Error::Timeout(_) => Self::Timeout,
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Transport(message) => Self::Network(message),
            RemoteError::Status { code, message } => Self::Http {
                status: code,
                message,
            },
            RemoteError::Cancelled => Self::Cancelled,
            RemoteError::DeadlineExceeded => Self::DeadlineExceeded,
            RemoteError::Protocol(message) => Self::InvalidResponse(message),
            RemoteError::UnsupportedKind(kind) => Self::UnsupportedKind(kind),
        }
    }
}

impl From<Error> for RemoteError {
    fn from(err: Error) -> Self {
        match err {
            Error::Http { status, message } => Self::Status {
                code: status,
                message,
            },
            Error::Network(message) => Self::Transport(message),
            Error::Timeout => Self::Transport("request timed out".to_string()),
            Error::Cancelled => Self::Cancelled,
            Error::DeadlineExceeded => Self::DeadlineExceeded,
            Error::UnsupportedKind(kind) => Self::UnsupportedKind(kind),
            other @ (Error::InvalidResponse(_) | Error::InvalidRequest(_) | Error::Config(_)) => {
                Self::Protocol(other.to_string())
            }
        }
    }
}
