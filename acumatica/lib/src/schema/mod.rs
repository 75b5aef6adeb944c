//! Read-only access to an OpenAPI schema document and the property type mapper.

mod document;
mod types;

pub use document::{SchemaDocument, ref_name};
pub use types::{DefaultSpec, PrimitiveWrapper, ScalarKind, TypeSpec, is_skipped_field, map_property};
