//! Error types for the Trakure dashboard

use std::{error::Error as StdError, fmt};

/// Main error type for the Trakure dashboard
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Configuration {
        /// Error message
        message: String,
    },

    /// Validation error
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// The API answered with a non-2xx status
    RequestFailed {
        /// Endpoint that was called
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The API answered 2xx but the body could not be decoded
    ParseFailed {
        /// Endpoint that was called
        endpoint: String,
        /// Decoder message
        message: String,
    },

    /// The request never produced a response
    Network {
        /// Endpoint that was called
        endpoint: String,
        /// Transport error message
        message: String,
    },

    /// Timeout error
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Not found error
    NotFound {
        /// Resource that was not found
        resource: String,
    },

    /// Serialization error
    Serialization(serde_json::Error),

    /// Template rendering error
    Render(String),

    /// Other error
    Other(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Transport failures, timeouts, 5xx and 429 responses are transient;
    /// everything else is answered the same way on every attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::RequestFailed { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Configuration { message } => write!(f, "Configuration error: {message}"),
            Self::Validation { field, message } => {
                write!(f, "Validation error: {field} - {message}")
            }
            Self::RequestFailed { endpoint, status } => {
                write!(f, "Request to {endpoint} failed with status {status}")
            }
            Self::ParseFailed { endpoint, message } => {
                write!(f, "Failed to parse response from {endpoint}: {message}")
            }
            Self::Network { endpoint, message } => {
                write!(f, "Network error calling {endpoint}: {message}")
            }
            Self::Timeout { duration_ms } => {
                write!(f, "Operation timed out after {duration_ms}ms")
            }
            Self::NotFound { resource } => write!(f, "Resource not found: {resource}"),
            Self::Serialization(err) => write!(f, "Serialization error: {err}"),
            Self::Render(msg) => write!(f, "Render error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// From implementations for automatic conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map_or_else(|| "record".to_string(), ToString::to_string);
        Self::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::missing_panics_doc,
    clippy::uninlined_format_args,
    clippy::unwrap_used
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io;

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let app_error = Error::from(io_error);

        assert!(matches!(app_error, Error::Io(_)));
        assert!(format!("{}", app_error).contains("I/O error"));
        assert!(app_error.source().is_some());
    }

    #[test]
    fn test_request_failed_display() {
        let error = Error::RequestFailed {
            endpoint: "/api/dashboard/stats".to_string(),
            status: 503,
        };

        assert_eq!(
            format!("{}", error),
            "Request to /api/dashboard/stats failed with status 503"
        );
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn test_parse_failed_display() {
        let error = Error::ParseFailed {
            endpoint: "/api/dashboard/movement-stats".to_string(),
            message: "expected value at line 1 column 1".to_string(),
        };

        assert_eq!(
            format!("{}", error),
            "Failed to parse response from /api/dashboard/movement-stats: expected value at line 1 column 1"
        );
        assert!(error.source().is_none());
    }

    #[test]
    fn test_not_found_reports_404() {
        let error = Error::NotFound {
            resource: "https://cdn.example.com/a.png".to_string(),
        };

        assert_eq!(error.status(), Some(404));
        assert_eq!(
            format!("{}", error),
            "Resource not found: https://cdn.example.com/a.png"
        );
    }

    #[rstest]
    #[case(Error::Network { endpoint: "/x".into(), message: "reset".into() }, true)]
    #[case(Error::Timeout { duration_ms: 30_000 }, true)]
    #[case(Error::RequestFailed { endpoint: "/x".into(), status: 500 }, true)]
    #[case(Error::RequestFailed { endpoint: "/x".into(), status: 502 }, true)]
    #[case(Error::RequestFailed { endpoint: "/x".into(), status: 429 }, true)]
    #[case(Error::RequestFailed { endpoint: "/x".into(), status: 404 }, false)]
    #[case(Error::RequestFailed { endpoint: "/x".into(), status: 401 }, false)]
    #[case(Error::ParseFailed { endpoint: "/x".into(), message: "bad".into() }, false)]
    #[case(Error::NotFound { resource: "/x".into() }, false)]
    #[case(Error::Other("boom".into()), false)]
    fn test_retryable_classification(#[case] error: Error, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected, "{error}");
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>(r#"{"invalid": json}"#)
            .unwrap_err();
        let app_error = Error::from(json_error);

        assert!(matches!(app_error, Error::Serialization(_)));
        assert!(app_error.source().is_some());
    }

    #[test]
    fn test_validation_errors_conversion() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("name", validator::ValidationError::new("length"));

        let error = Error::from(errors);
        match error {
            Error::Validation { field, .. } => assert_eq!(field, "name"),
            other => panic!("Expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_error_with_zero_duration() {
        let error = Error::Timeout { duration_ms: 0 };

        assert_eq!(format!("{}", error), "Operation timed out after 0ms");
    }
}
