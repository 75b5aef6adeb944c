//! HTTP client and network errors.

use thiserror::Error;

/// Errors from the HTTP transport.
///
/// Server-side failures carry the detail text extracted from the response
/// body so callers see the message the ERP produced.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed due to network or protocol error.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned a non-success HTTP status code.
    #[error("Acumatica API error {status}: {message}")]
    HttpStatus {
        /// The HTTP status code returned.
        status: u16,
        /// Detail extracted from the response body.
        message: String,
    },

    /// Login was rejected by the server.
    #[error("Login failed with HTTP {status}: {message}")]
    LoginFailed {
        /// The HTTP status code returned by the login endpoint.
        status: u16,
        /// Detail extracted from the response body.
        message: String,
    },

    /// A URL could not be built from the base URL and a path.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// A header name or value was rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ClientError {
    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns the HTTP status code if the server produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } | Self::LoginFailed { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_500_is_retryable() {
        let err = ClientError::HttpStatus {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_400_not_retryable() {
        let err = ClientError::HttpStatus {
            status: 400,
            message: "Bad Request".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display_includes_status_and_detail() {
        let err = ClientError::HttpStatus {
            status: 422,
            message: "CustomerID cannot be empty.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Acumatica API error 422: CustomerID cannot be empty."
        );
    }
}
