//! HTTP verbs as they appear in schema path items.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// HTTP methods declared by operations in the schema.
///
/// Path items key their operations by lowercase verb (`get`, `put`, ...);
/// parsing is case-insensitive so both spellings are accepted.
///
/// ## Examples
///
/// ```rust
/// use acumatica_client::HttpMethod;
///
/// let parsed: HttpMethod = "put".parse().unwrap();
/// assert_eq!(parsed, HttpMethod::Put);
/// assert_eq!(parsed.to_string(), "PUT");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Retrieve a resource.
    Get,
    /// Invoke an action or log in.
    Post,
    /// Create or update an entity, or upload a file.
    Put,
    /// Remove a resource.
    Delete,
}

impl HttpMethod {
    /// Converts to the equivalent `reqwest::Method`.
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        method.to_reqwest()
    }
}
