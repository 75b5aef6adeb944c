//! Client configuration errors.

use thiserror::Error;

/// Errors in client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A required configuration field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// An environment variable held an unusable value.
    #[error("Invalid value for {variable}: {value}")]
    InvalidValue {
        /// The variable name.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The server does not advertise a version for the requested endpoint.
    #[error("No version found for endpoint '{endpoint}'")]
    UnknownEndpointVersion {
        /// The endpoint name.
        endpoint: String,
    },
}

impl ConfigError {
    /// Creates a missing field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(variable: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            variable,
            value: value.into(),
        }
    }
}
