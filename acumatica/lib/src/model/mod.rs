//! Runtime model types generated from `components.schemas`.
//!
//! Generation runs in two phases. [`describe_models`] walks the schema into
//! serializable [`ModelSpec`] descriptions, which is also what the snapshot
//! cache stores. [`materialize`] turns descriptions into a [`ModelRegistry`]
//! of shared [`ModelType`]s whose entity references are resolved in one
//! pass over the completed registry.

mod factory;
mod instance;
mod types;

pub use factory::{
    FieldSpec, ModelSpec, build_models, describe_model, describe_models, lineage, materialize,
};
pub use instance::{FieldValue, ModelInstance};
pub use types::{FieldDef, FieldType, ModelLink, ModelRegistry, ModelType};
