//! Top-level client error type.

use super::{CacheError, ClientError, ConfigError, ModelError, SchemaError, ValidationError};
use thiserror::Error;

/// Top-level error type for every client operation.
///
/// ## Examples
///
/// ```rust,ignore
/// use acumatica_client::AcumaticaError;
///
/// fn report(err: AcumaticaError) {
///     match err {
///         AcumaticaError::Client(e) => eprintln!("request failed: {e}"),
///         AcumaticaError::Schema(e) => eprintln!("bad schema: {e}"),
///         other => eprintln!("{other}"),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum AcumaticaError {
    /// HTTP transport errors and non-success responses.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Schema document errors raised while generating models or services.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Generated model or service misuse.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Snapshot cache errors.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Client configuration errors.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Response decoding errors.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl AcumaticaError {
    /// Returns the HTTP status code when the error came from a server response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Client(e) => e.status_code(),
            _ => None,
        }
    }

    /// Returns `true` for transient transport failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_client_error() {
        let err: AcumaticaError = ClientError::HttpStatus {
            status: 404,
            message: "Not Found".to_string(),
        }
        .into();
        assert!(matches!(err, AcumaticaError::Client(_)));
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn test_from_schema_error() {
        let err: AcumaticaError = SchemaError::UnknownEntity {
            name: "Ghost".to_string(),
        }
        .into();
        assert!(matches!(err, AcumaticaError::Schema(_)));
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_only_transient_client_errors_are_retryable() {
        let unavailable: AcumaticaError = ClientError::HttpStatus {
            status: 503,
            message: "Service Unavailable".to_string(),
        }
        .into();
        assert!(unavailable.is_retryable());
        let throttled: AcumaticaError = ClientError::HttpStatus {
            status: 429,
            message: "Too Many Requests".to_string(),
        }
        .into();
        assert!(throttled.is_retryable());
        let rejected: AcumaticaError = ClientError::HttpStatus {
            status: 422,
            message: "CustomerID cannot be empty.".to_string(),
        }
        .into();
        assert!(!rejected.is_retryable());
        let misuse: AcumaticaError = ModelError::UnknownService {
            name: "Ghost".to_string(),
        }
        .into();
        assert!(!misuse.is_retryable());
    }

    #[test]
    fn test_transparent_display() {
        let err: AcumaticaError = ConfigError::missing_field("base_url").into();
        assert_eq!(err.to_string(), "Missing required field: base_url");
    }
}
