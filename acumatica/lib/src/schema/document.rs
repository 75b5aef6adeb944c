//! The schema document as downloaded from `swagger.json`.

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::hash::hash_json;
use crate::method::HttpMethod;

/// Returns the final segment of a JSON reference (`#/components/schemas/X` → `X`).
pub fn ref_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// A parsed OpenAPI document.
///
/// The document is never mutated once parsed. Key order is preserved so
/// generated fields and methods follow declaration order.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    raw: Value,
}

impl SchemaDocument {
    /// Wraps an already-parsed JSON value.
    ///
    /// ## Errors
    ///
    /// Returns [`SchemaError::Malformed`] when the root is not an object.
    pub fn from_value(raw: Value) -> Result<Self, SchemaError> {
        if !raw.is_object() {
            return Err(SchemaError::malformed("document root is not an object"));
        }
        Ok(Self { raw })
    }

    /// Parses a document from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SchemaError> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// The underlying JSON.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Hash of the whole document, independent of key order.
    pub fn content_hash(&self) -> u64 {
        hash_json(&self.raw)
    }

    /// The `components.schemas` mapping, if present.
    pub fn schemas(&self) -> Option<&Map<String, Value>> {
        self.raw
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(Value::as_object)
    }

    /// Looks up one entity definition by name.
    pub fn schema(&self, name: &str) -> Option<&Value> {
        self.schemas().and_then(|s| s.get(name))
    }

    /// Returns `true` if `components.schemas` declares `name`.
    pub fn has_schema(&self, name: &str) -> bool {
        self.schema(name).is_some()
    }

    /// Iterates every `(path, verb, details)` triple under `paths`.
    ///
    /// Path-item keys that are not HTTP verbs (`parameters`, `summary`, ...)
    /// and operations that are not objects are skipped.
    pub fn operations(&self) -> impl Iterator<Item = (&str, HttpMethod, &Value)> {
        self.raw
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|paths| paths.iter())
            .filter_map(|(path, item)| item.as_object().map(|ops| (path.as_str(), ops)))
            .flat_map(|(path, ops)| {
                ops.iter().filter_map(move |(verb, details)| {
                    let method = verb.parse::<HttpMethod>().ok()?;
                    details.is_object().then_some((path, method, details))
                })
            })
    }

    /// Resolves a parameter object, following a `$ref` into
    /// `components.parameters` when present.
    pub fn resolve_parameter<'a>(&'a self, param: &'a Value) -> &'a Value {
        match param.get("$ref").and_then(Value::as_str) {
            Some(reference) => self
                .raw
                .get("components")
                .and_then(|c| c.get("parameters"))
                .and_then(|p| p.get(ref_name(reference)))
                .unwrap_or(param),
            None => param,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> SchemaDocument {
        SchemaDocument::from_value(json!({
            "paths": {
                "/Contact": {
                    "parameters": [],
                    "get": {"tags": ["Contact"], "operationId": "Contact_GetList"},
                    "put": {"tags": ["Contact"], "operationId": "Contact_PutEntity"}
                },
                "/Contact/{ids}": {
                    "delete": {"tags": ["Contact"], "operationId": "Contact_DeleteById"}
                }
            },
            "components": {
                "parameters": {"ids": {"name": "ids", "in": "path"}},
                "schemas": {"Contact": {"type": "object", "properties": {}}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_ref_name() {
        assert_eq!(ref_name("#/components/schemas/StringValue"), "StringValue");
        assert_eq!(ref_name("Plain"), "Plain");
    }

    #[test]
    fn test_rejects_non_object_root() {
        let err = SchemaDocument::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
    }

    #[test]
    fn test_from_slice_invalid_json() {
        let err = SchemaDocument::from_slice(b"{ not json").unwrap_err();
        assert!(matches!(err, SchemaError::Json(_)));
    }

    #[test]
    fn test_operations_skip_non_verbs_and_keep_order() {
        let doc = doc();
        let ops: Vec<_> = doc
            .operations()
            .map(|(path, method, _)| (path.to_string(), method))
            .collect();
        assert_eq!(
            ops,
            vec![
                ("/Contact".to_string(), HttpMethod::Get),
                ("/Contact".to_string(), HttpMethod::Put),
                ("/Contact/{ids}".to_string(), HttpMethod::Delete),
            ]
        );
    }

    #[test]
    fn test_resolve_parameter_ref() {
        let doc = doc();
        let param = json!({"$ref": "#/components/parameters/ids"});
        assert_eq!(doc.resolve_parameter(&param)["name"], "ids");
        let inline = json!({"name": "id", "in": "path"});
        assert_eq!(doc.resolve_parameter(&inline)["name"], "id");
    }

    #[test]
    fn test_missing_schemas_section() {
        let doc = SchemaDocument::from_value(json!({})).unwrap();
        assert!(doc.schemas().is_none());
        assert!(!doc.has_schema("Contact"));
        assert_eq!(doc.operations().count(), 0);
    }
}
