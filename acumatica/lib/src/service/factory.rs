//! Grouping of schema operations into service descriptions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::doc::{OperationDoc, describe_operation};
use super::kind::OperationKind;
use crate::hash::hash_json;
use crate::method::HttpMethod;
use crate::naming::method_name;
use crate::schema::SchemaDocument;

/// Description of one generated service method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub operation_id: String,
    pub method_name: String,
    pub kind: OperationKind,
    pub http_method: HttpMethod,
    /// Path template as declared in the schema.
    pub path: String,
    /// Action name for action invocations (last path segment).
    pub action: Option<String>,
    pub doc: OperationDoc,
}

/// Description of one generated service (one schema tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub tag: String,
    pub operations: Vec<OperationSpec>,
}

impl ServiceSpec {
    /// Looks up an operation by generated method name.
    pub fn operation(&self, method_name: &str) -> Option<&OperationSpec> {
        self.operations.iter().find(|op| op.method_name == method_name)
    }
}

/// The raw operations sharing one tag.
#[derive(Debug, Clone)]
pub struct OperationGroup<'a> {
    pub tag: String,
    pub operations: Vec<(&'a str, HttpMethod, &'a Value)>,
}

impl OperationGroup<'_> {
    /// Hash of the group's aggregate operation set.
    pub fn content_hash(&self) -> u64 {
        let ops: Vec<Value> = self
            .operations
            .iter()
            .map(|(path, method, details)| {
                json!({"path": path, "method": method, "details": details})
            })
            .collect();
        hash_json(&Value::Array(ops))
    }
}

/// Groups every tagged operation by its first tag, in document order.
pub fn operation_groups(doc: &SchemaDocument) -> BTreeMap<String, OperationGroup<'_>> {
    let mut groups: BTreeMap<String, OperationGroup<'_>> = BTreeMap::new();
    for (path, method, details) in doc.operations() {
        let Some(tag) = details
            .get("tags")
            .and_then(Value::as_array)
            .and_then(|tags| tags.first())
            .and_then(Value::as_str)
        else {
            continue;
        };
        groups
            .entry(tag.to_string())
            .or_insert_with(|| OperationGroup {
                tag: tag.to_string(),
                operations: Vec::new(),
            })
            .operations
            .push((path, method, details));
    }
    groups
}

/// Describes one service from its operation group.
///
/// Operations without a parsable operationId or with an unrecognised kind
/// are skipped.
pub fn describe_service(doc: &SchemaDocument, group: &OperationGroup<'_>) -> ServiceSpec {
    let mut operations: Vec<OperationSpec> = Vec::new();

    for (path, http_method, details) in &group.operations {
        let operation_id = details
            .get("operationId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(name) = method_name(operation_id) else {
            debug!(tag = %group.tag, operation_id, "skipping operation without grouping separator");
            continue;
        };
        let Some(kind) = OperationKind::classify(operation_id) else {
            debug!(tag = %group.tag, operation_id, "skipping unsupported operation");
            continue;
        };

        let action = (kind == OperationKind::InvokeAction)
            .then(|| path.rsplit('/').next().unwrap_or_default().to_string());

        let spec = OperationSpec {
            operation_id: operation_id.to_string(),
            method_name: name,
            kind,
            http_method: *http_method,
            path: path.to_string(),
            action,
            doc: describe_operation(doc, &group.tag, operation_id, details),
        };

        match operations.iter_mut().find(|op| op.method_name == spec.method_name) {
            Some(existing) => {
                warn!(tag = %group.tag, method = %spec.method_name, "duplicate method name, keeping the last");
                *existing = spec;
            }
            None => operations.push(spec),
        }
    }

    ServiceSpec {
        tag: group.tag.clone(),
        operations,
    }
}

/// Describes every service in the document, keyed by tag.
#[instrument(skip(doc))]
pub fn describe_services(doc: &SchemaDocument) -> BTreeMap<String, ServiceSpec> {
    let services: BTreeMap<String, ServiceSpec> = operation_groups(doc)
        .into_iter()
        .map(|(tag, group)| (tag, describe_service(doc, &group)))
        .collect();
    debug!(count = services.len(), "described services");
    services
}
