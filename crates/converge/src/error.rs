//! Error types for reconciliation.
//!
//! Two layers: [`ProviderError`] is what a control-plane adapter returns,
//! and [`Error`] is what the engine reports. The engine wraps provider
//! errors with the resource and operation so the final message says which
//! call failed.

use thiserror::Error;

/// Categories of provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection, DNS, timeout
    Network,
    /// Missing or rejected credentials
    Auth,
    /// The request was rejected as invalid
    Validation,
    /// The resource is in a conflicting state
    Conflict,
    /// Rate limited
    Throttled,
    /// The control plane failed
    Server,
    /// The response could not be understood
    Malformed,
    /// Anything else
    Other,
}

impl ProviderErrorKind {
    /// Whether this failure is typically transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Throttled | Self::Server)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::Validation => "Request rejected",
            Self::Conflict => "Resource conflict",
            Self::Throttled => "Rate limited",
            Self::Server => "Control plane error",
            Self::Malformed => "Unexpected response",
            Self::Other => "Unexpected error",
        }
    }
}

/// Failure reported by a [`Provider`](crate::Provider) call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// HTTP status or equivalent, when the provider has one
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Malformed, message)
    }
}

/// Broad classes of reconciliation errors, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input, rejected before any remote call
    InvalidParameter,
    /// The request cannot be satisfied given the observed state
    Precondition,
    /// Reading current state failed
    Fetch,
    /// A mutating call or poll failed
    Provider,
    /// A bounded wait ran out
    Timeout,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "invalid_parameter",
            Self::Precondition => "precondition_violation",
            Self::Fetch => "fetch_failed",
            Self::Provider => "provider_call_failed",
            Self::Timeout => "poll_timeout",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "Fix the request file and try again",
            Self::Precondition => "Recreate the resource or drop the conflicting field",
            Self::Fetch => "Check credentials and connectivity to the control plane",
            Self::Provider => "Check the provider message for details",
            Self::Timeout => "The operation may still complete; re-run to converge",
        }
    }
}

/// Errors that abort a reconciliation.
#[derive(Debug, Error)]
pub enum Error {
    /// Parameter rejected at the boundary
    #[error("invalid parameter '{field}': {message}")]
    InvalidParameter { field: String, message: String },

    /// The request conflicts with observed state or is incomplete
    #[error("{resource}: {message}")]
    PreconditionViolation { resource: String, message: String },

    /// Fetching current state failed for a reason other than not-found
    #[error("failed to fetch {resource}: {source}")]
    Fetch {
        resource: String,
        #[source]
        source: ProviderError,
    },

    /// A create, update, delete or poll call failed
    #[error("{operation} of {resource} failed: {source}")]
    ProviderCall {
        resource: String,
        operation: &'static str,
        #[source]
        source: ProviderError,
    },

    /// A bounded wait was exhausted
    #[error("timed out waiting for {operation} of {resource} after {attempts} polls")]
    PollTimeout {
        resource: String,
        operation: &'static str,
        attempts: u32,
    },
}

impl Error {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn precondition(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidParameter { .. } => ErrorCategory::InvalidParameter,
            Error::PreconditionViolation { .. } => ErrorCategory::Precondition,
            Error::Fetch { .. } => ErrorCategory::Fetch,
            Error::ProviderCall { .. } => ErrorCategory::Provider,
            Error::PollTimeout { .. } => ErrorCategory::Timeout,
        }
    }

    /// The provider failure underneath, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Error::Fetch { source, .. } | Error::ProviderCall { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_retryable() {
        assert!(ProviderErrorKind::Throttled.is_retryable());
        assert!(ProviderErrorKind::Network.is_retryable());
        assert!(!ProviderErrorKind::Validation.is_retryable());
        assert!(!ProviderErrorKind::Auth.is_retryable());
    }

    #[test]
    fn test_error_category() {
        let err = Error::invalid("sku", "unknown token");
        assert_eq!(err.category(), ErrorCategory::InvalidParameter);
        assert_eq!(err.category().as_str(), "invalid_parameter");

        let err = Error::PollTimeout {
            resource: "rg1/gw1".to_string(),
            operation: "delete confirmation",
            attempts: 3,
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(err.provider_error().is_none());
    }

    #[test]
    fn test_provider_call_message_names_resource() {
        let err = Error::ProviderCall {
            resource: "rg1/plan1".to_string(),
            operation: "create",
            source: ProviderError::new(ProviderErrorKind::Validation, "sku not allowed")
                .with_status(400),
        };
        assert_eq!(err.to_string(), "create of rg1/plan1 failed: sku not allowed");
        assert_eq!(err.provider_error().and_then(|e| e.status), Some(400));
    }
}
