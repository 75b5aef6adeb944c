//! Errors from using generated models and service methods.

use thiserror::Error;

/// Misuse of generated types at runtime.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No model with this name exists in the registry.
    #[error("Unknown model '{name}'")]
    UnknownModel {
        /// Requested model name.
        name: String,
    },

    /// The model has no field with this name.
    #[error("Model '{model}' has no field '{field}'")]
    UnknownField {
        /// The model name.
        model: String,
        /// The requested field.
        field: String,
    },

    /// A value cannot be coerced to the field's declared type.
    #[error("Field '{model}.{field}' expects {expected}")]
    InvalidValue {
        /// The model name.
        model: String,
        /// The field being set.
        field: String,
        /// The declared field type.
        expected: String,
    },

    /// No service bound for this tag.
    #[error("Unknown service '{name}'")]
    UnknownService {
        /// Requested service tag.
        name: String,
    },

    /// The service has no method with this name.
    #[error("Service '{service}' has no method '{method}'")]
    UnknownMethod {
        /// The service tag.
        service: String,
        /// The requested method.
        method: String,
    },

    /// Arguments do not fit the kind of operation the method performs.
    #[error("Method '{method}' expects {expected}")]
    ArgumentMismatch {
        /// The method name.
        method: String,
        /// Description of the expected arguments.
        expected: &'static str,
    },
}
