//! Layered error types for the Acumatica client.
//!
//! - [`AcumaticaError`] - Top-level error type returned by the client facade
//! - [`ClientError`] - HTTP transport failures and non-success statuses
//! - [`SchemaError`] - Malformed or inconsistent schema documents
//! - [`ModelError`] - Misuse of generated models and service methods
//! - [`CacheError`] - Snapshot read/write failures (recovered internally)
//! - [`ConfigError`] - Missing or invalid client configuration
//! - [`ValidationError`] - Response decoding failures

mod acumatica_error;
mod cache_error;
mod client_error;
mod config_error;
mod model_error;
mod schema_error;
mod validation_error;

pub use acumatica_error::AcumaticaError;
pub use cache_error::CacheError;
pub use client_error::ClientError;
pub use config_error::ConfigError;
pub use model_error::ModelError;
pub use schema_error::SchemaError;
pub use validation_error::ValidationError;
