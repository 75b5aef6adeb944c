//! Errors raised while turning a schema document into models and services.

use thiserror::Error;

/// Errors in the schema document itself.
///
/// These abort the generation pass that raised them; nothing partially
/// generated is handed back to callers.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A reference names an entity absent from `components.schemas`.
    #[error("Schema references unknown entity '{name}'")]
    UnknownEntity {
        /// The referenced entity name.
        name: String,
    },

    /// The document is missing a required section or has the wrong shape.
    #[error("Malformed schema document: {message}")]
    Malformed {
        /// Description of what was wrong.
        message: String,
    },

    /// The schema body could not be parsed as JSON.
    #[error("Schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Creates a malformed-document error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates an unknown-entity error.
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::UnknownEntity { name: name.into() }
    }
}
