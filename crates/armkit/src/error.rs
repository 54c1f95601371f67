//! Error types for Resource Manager calls.
//!
//! Errors are categorized from the HTTP status and the ARM error body so
//! callers can tell throttling and outages apart from rejected requests.

use converge::{ProviderError, ProviderErrorKind};
use serde::Deserialize;
use std::fmt;

/// Result type alias for Resource Manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of Resource Manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS or timeout (transient, retryable)
    Network,
    /// The resource or its group does not exist
    NotFound,
    /// Token missing, expired or lacking permission
    Auth,
    /// Request rejected by validation
    Validation,
    /// Conflicting concurrent change or resource state
    Conflict,
    /// Too many requests
    Throttled,
    /// Control plane failure (5xx)
    Server,
    /// Unexpected response shape
    Format,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Throttled | Self::Server)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Resource not found",
            Self::Auth => "Authentication or authorization failed",
            Self::Validation => "Request rejected",
            Self::Conflict => "Resource conflict",
            Self::Throttled => "Rate limited",
            Self::Server => "Resource Manager error",
            Self::Format => "Invalid response format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::NotFound => "Verify the resource group and resource names",
            Self::Auth => "Refresh the access token (az account get-access-token) and check role assignments",
            Self::Validation => "Check the request parameters against the resource kind",
            Self::Conflict => "Wait for the pending operation on the resource to finish",
            Self::Throttled => "Wait a moment and re-run",
            Self::Server => "Re-run later; the change is idempotent",
            Self::Format => "The API version may not match the resource kind",
            Self::Other => "Check the error details for more information",
        }
    }

    /// Category for an HTTP status code.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            404 => Self::NotFound,
            400 | 422 => Self::Validation,
            409 | 412 => Self::Conflict,
            429 => Self::Throttled,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during Resource Manager calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure before a response arrived.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
    },

    /// The API answered with an error status.
    #[error("{code} (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// ARM error code, e.g. `InvalidResourceName`.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Response body could not be understood.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// No api-version registered for a resource kind.
    #[error("no api-version registered for {0}")]
    UnknownKind(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl Error {
    /// Build an error from a failed response.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self::Api {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => Self::Api {
                status,
                code: format!("HTTP{status}"),
                message: body.trim().to_string(),
            },
        }
    }

    /// HTTP status, if the API answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { .. } => ErrorCategory::Network,
            Error::Api { status, .. } => ErrorCategory::from_status(*status),
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::UnknownKind(_) => ErrorCategory::Validation,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Api {
                status: code,
                code: format!("HTTP{code}"),
                message: format!("HTTP {code}"),
            },
            other => Self::Http {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<Error> for ProviderError {
    fn from(err: Error) -> Self {
        let kind = match err.category() {
            ErrorCategory::Network => ProviderErrorKind::Network,
            ErrorCategory::Auth => ProviderErrorKind::Auth,
            ErrorCategory::Validation | ErrorCategory::NotFound => ProviderErrorKind::Validation,
            ErrorCategory::Conflict => ProviderErrorKind::Conflict,
            ErrorCategory::Throttled => ProviderErrorKind::Throttled,
            ErrorCategory::Server => ProviderErrorKind::Server,
            ErrorCategory::Format => ProviderErrorKind::Malformed,
            ErrorCategory::Other => ProviderErrorKind::Other,
        };
        let status = err.status();
        let provider = ProviderError::new(kind, err.to_string());
        match status {
            Some(status) => provider.with_status(status),
            None => provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Throttled.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
    }

    #[test]
    fn test_category_from_status() {
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_status(409), ErrorCategory::Conflict);
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::Throttled);
        assert_eq!(ErrorCategory::from_status(503), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(418), ErrorCategory::Other);
    }

    #[test]
    fn test_from_response_parses_arm_error() {
        let body = r#"{"error": {"code": "InvalidResourceName", "message": "Name 'a b' is invalid"}}"#;
        let err = Error::from_response(400, body);
        assert_eq!(
            err.to_string(),
            "InvalidResourceName (HTTP 400): Name 'a b' is invalid"
        );
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_from_response_plain_body() {
        let err = Error::from_response(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "HTTP502 (HTTP 502): Bad Gateway");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_into_provider_error() {
        let err = Error::from_response(429, r#"{"error": {"code": "TooManyRequests", "message": "slow down"}}"#);
        let provider: ProviderError = err.into();
        assert_eq!(provider.kind, ProviderErrorKind::Throttled);
        assert_eq!(provider.status, Some(429));
        assert!(provider.message.contains("slow down"));
    }
}
