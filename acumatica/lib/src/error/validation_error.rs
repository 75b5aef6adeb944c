//! Response decoding errors.

use thiserror::Error;

/// Errors decoding a response body.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    /// The body was JSON but not the expected shape.
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl ValidationError {
    /// Returns `true` if this is a parsing error.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::JsonParse(_) | Self::XmlParse(_))
    }
}
