//! Acumatica Client
//!
//! A client for Acumatica's contract-based REST API whose models and
//! service methods are generated at runtime from the endpoint's own
//! OpenAPI schema, so custom fields and customization projects show up
//! without a code generator.
//!
//! ## Features
//!
//! - **Runtime models**: one [`model::ModelType`] per schema component,
//!   with forward references resolved after every model exists
//! - **Generated services**: one [`service::Service`] per tag, dispatching
//!   on the [`service::OperationKind`] derived from each operationId
//! - **Generic inquiries**: methods generated from the OData `$metadata`
//! - **Differential cache**: per-component hashes mean only changed models
//!   and services are generated again on the next connect
//! - **Batches**: many generated calls run concurrently with retries,
//!   results kept in input order
//! - **OData queries**: [`QueryOptions`] and the [`Filter`] builder
//!
//! ## Quick Start
//!
//! ```ignore
//! use acumatica_client::{AcumaticaClient, ClientConfig, F, QueryOptions};
//!
//! let client = AcumaticaClient::connect(ClientConfig::from_env()?).await?;
//!
//! let options = QueryOptions::new()
//!     .filter(F::field("Status").eq("Active"))
//!     .top(10);
//! let customers = client.service("Customer")?.get_list(Some(options), None).await?;
//!
//! println!("{:?}", client.cache_stats().state);
//! client.close().await?;
//! ```
//!
//! ## Module Structure
//!
//! - [`client`] - The connected [`AcumaticaClient`] facade
//! - [`schema`] - Schema document access and the property type mapper
//! - [`model`] - Model descriptions, runtime model types and instances
//! - [`service`] - Service descriptions, docs and bound services
//! - [`inquiry`] - Generic inquiry metadata and the inquiries service
//! - [`batch`] - Concurrent execution of generated calls
//! - [`cache`] - The differential snapshot cache
//! - [`transport`] - Session-holding HTTP transport
//! - [`error`] - Layered error types

pub mod batch;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod hash;
pub mod inquiry;
pub mod method;
pub mod model;
pub mod naming;
pub mod odata;
pub mod schema;
pub mod service;
pub mod transport;

pub use cache::{CacheConfig, CacheState, CacheStats};
pub use client::AcumaticaClient;
pub use config::ClientConfig;
pub use error::{
    AcumaticaError, CacheError, ClientError, ConfigError, ModelError, SchemaError, ValidationError,
};
pub use method::HttpMethod;
pub use model::{FieldValue, ModelInstance};
pub use odata::{CustomField, F, Filter, QueryOptions};
pub use service::{EntityId, Invocation, Payload};
