//! Services bound to a live transport.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::Url;

use super::doc::OperationDoc;
use super::factory::{OperationSpec, ServiceSpec, describe_services};
use super::kind::OperationKind;
use crate::error::{AcumaticaError, ClientError, ModelError};
use crate::method::HttpMethod;
use crate::model::ModelInstance;
use crate::odata::QueryOptions;
use crate::schema::SchemaDocument;
use crate::transport::{Request, Transport};

/// Header carrying the comment for an attached file.
const FILE_COMMENT_HEADER: &str = "PX-CbFileComment";

/// An entity key: a single id or the parts of a composite key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityId {
    Single(String),
    Keys(Vec<String>),
}

impl EntityId {
    /// The URL segment for this key; composite keys are comma-joined.
    pub fn to_segment(&self) -> String {
        match self {
            Self::Single(id) => id.clone(),
            Self::Keys(keys) => keys.join(","),
        }
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::Single(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::Single(id)
    }
}

impl From<Vec<String>> for EntityId {
    fn from(keys: Vec<String>) -> Self {
        Self::Keys(keys)
    }
}

impl From<Vec<&str>> for EntityId {
    fn from(keys: Vec<&str>) -> Self {
        Self::Keys(keys.into_iter().map(str::to_string).collect())
    }
}

/// Entity data: a generated model instance or a raw mapping sent as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Model(ModelInstance),
    Json(Map<String, Value>),
}

impl Payload {
    pub fn to_json(&self) -> Map<String, Value> {
        match self {
            Self::Model(instance) => instance.to_payload(),
            Self::Json(map) => map.clone(),
        }
    }
}

impl From<ModelInstance> for Payload {
    fn from(instance: ModelInstance) -> Self {
        Self::Model(instance)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self::Json(map)
    }
}

/// Arguments for one generated method call.
///
/// Each variant matches one [`OperationKind`]; calling a method with the
/// wrong variant fails with [`ModelError::ArgumentMismatch`].
#[derive(Debug, Clone)]
pub enum Invocation {
    List {
        options: Option<QueryOptions>,
    },
    Get {
        id: EntityId,
        options: Option<QueryOptions>,
    },
    Put {
        data: Payload,
        options: Option<QueryOptions>,
    },
    Delete {
        id: EntityId,
    },
    Action {
        invocation: Payload,
    },
    AdHocSchema,
    File {
        id: EntityId,
        filename: String,
        data: Bytes,
        comment: Option<String>,
    },
}

/// One generated service: the operations of a single schema tag, bound
/// to an endpoint version and a transport.
#[derive(Debug, Clone)]
pub struct Service {
    spec: ServiceSpec,
    endpoint: String,
    version: String,
    transport: Arc<Transport>,
}

impl Service {
    pub fn new(
        spec: ServiceSpec,
        transport: Arc<Transport>,
        endpoint: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            spec,
            endpoint: endpoint.into(),
            version: version.into(),
            transport,
        }
    }

    /// The schema tag, which is also the entity name in URLs.
    pub fn entity_name(&self) -> &str {
        &self.spec.tag
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn methods(&self) -> impl Iterator<Item = &OperationSpec> {
        self.spec.operations.iter()
    }

    pub fn method(&self, name: &str) -> Option<&OperationSpec> {
        self.spec.operation(name)
    }

    /// The derived documentation of a method.
    pub fn doc(&self, name: &str) -> Option<&OperationDoc> {
        self.method(name).map(|op| &op.doc)
    }

    /// Invokes a generated method by name.
    ///
    /// `api_version` overrides the endpoint version for this call only.
    ///
    /// ## Errors
    ///
    /// Returns [`ModelError::UnknownMethod`] for names the service does
    /// not have, [`ModelError::ArgumentMismatch`] when `invocation` does
    /// not fit the method, and any transport error from the request.
    #[instrument(skip(self, invocation), fields(service = %self.spec.tag))]
    pub async fn call(
        &self,
        method: &str,
        invocation: Invocation,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        let op = self.method(method).ok_or_else(|| ModelError::UnknownMethod {
            service: self.spec.tag.clone(),
            method: method.to_string(),
        })?;
        let request = self.request(op, invocation, api_version)?;
        debug!(kind = %op.kind, url = %request.url(), "dispatching");
        self.transport.send(&request).await
    }

    /// Builds the HTTP request a method call would send.
    pub fn request(
        &self,
        op: &OperationSpec,
        invocation: Invocation,
        api_version: Option<&str>,
    ) -> Result<Request, AcumaticaError> {
        let version = api_version.unwrap_or(&self.version);
        let base = self
            .transport
            .entity_url(&self.endpoint, version, &self.spec.tag)?;

        let request = match (op.kind, invocation) {
            (OperationKind::GetList, Invocation::List { options }) => {
                Request::new(HttpMethod::Get, base).query(query_params(options.as_ref()))
            }
            (OperationKind::GetById, Invocation::Get { id, options }) => {
                let key = id.to_segment();
                Request::new(HttpMethod::Get, extend(base, &[key.as_str()])?)
                    .query(query_params(options.as_ref()))
            }
            (OperationKind::PutEntity, Invocation::Put { data, options }) => {
                Request::new(HttpMethod::Put, base)
                    .query(query_params(options.as_ref()))
                    .json(Value::Object(data.to_json()))
            }
            (OperationKind::Delete, Invocation::Delete { id }) => {
                let key = id.to_segment();
                Request::new(HttpMethod::Delete, extend(base, &[key.as_str()])?)
            }
            (OperationKind::InvokeAction, Invocation::Action { invocation }) => {
                let action = op.action.as_deref().unwrap_or(&op.method_name);
                Request::new(HttpMethod::Post, extend(base, &[action])?)
                    .json(action_body(&invocation.to_json()))
            }
            (OperationKind::GetAdHocSchema, Invocation::AdHocSchema) => {
                Request::new(HttpMethod::Get, extend(base, &["$adHocSchema"])?)
            }
            (
                OperationKind::PutFile,
                Invocation::File {
                    id,
                    filename,
                    data,
                    comment,
                },
            ) => {
                let key = id.to_segment();
                let url = extend(base, &[key.as_str(), "files", filename.as_str()])?;
                let request = Request::new(HttpMethod::Put, url).bytes(data);
                match comment.filter(|c| !c.is_empty()) {
                    Some(comment) => request.header(FILE_COMMENT_HEADER, comment),
                    None => request,
                }
            }
            (kind, _) => {
                return Err(ModelError::ArgumentMismatch {
                    method: op.method_name.clone(),
                    expected: kind.expected_arguments(),
                }
                .into());
            }
        };
        Ok(request)
    }

    fn method_of_kind(&self, kind: OperationKind) -> Result<&OperationSpec, ModelError> {
        self.methods()
            .find(|op| op.kind == kind)
            .ok_or_else(|| ModelError::UnknownMethod {
                service: self.spec.tag.clone(),
                method: kind.to_string(),
            })
    }

    async fn call_kind(
        &self,
        kind: OperationKind,
        invocation: Invocation,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        let name = self.method_of_kind(kind)?.method_name.clone();
        self.call(&name, invocation, api_version).await
    }

    // The typed helpers below take the same per-call `api_version`
    // override as `call`.

    /// Lists entities.
    pub async fn get_list(
        &self,
        options: Option<QueryOptions>,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        self.call_kind(OperationKind::GetList, Invocation::List { options }, api_version)
            .await
    }

    /// Fetches one entity by key.
    pub async fn get_by_id(
        &self,
        id: impl Into<EntityId>,
        options: Option<QueryOptions>,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        let invocation = Invocation::Get {
            id: id.into(),
            options,
        };
        self.call_kind(OperationKind::GetById, invocation, api_version)
            .await
    }

    /// Creates or updates an entity.
    pub async fn put_entity(
        &self,
        data: impl Into<Payload>,
        options: Option<QueryOptions>,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        let invocation = Invocation::Put {
            data: data.into(),
            options,
        };
        self.call_kind(OperationKind::PutEntity, invocation, api_version)
            .await
    }

    pub async fn delete_by_id(
        &self,
        id: impl Into<EntityId>,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        let invocation = Invocation::Delete { id: id.into() };
        self.call_kind(OperationKind::Delete, invocation, api_version)
            .await
    }

    /// Invokes an action by method name (`invoke_action_release`) or by
    /// action name (`Release`).
    pub async fn invoke_action(
        &self,
        action: &str,
        invocation: impl Into<Payload>,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        let name = self
            .methods()
            .find(|op| {
                op.kind == OperationKind::InvokeAction
                    && (op.method_name == action || op.action.as_deref() == Some(action))
            })
            .map(|op| op.method_name.clone())
            .ok_or_else(|| ModelError::UnknownMethod {
                service: self.spec.tag.clone(),
                method: action.to_string(),
            })?;
        let invocation = Invocation::Action {
            invocation: invocation.into(),
        };
        self.call(&name, invocation, api_version).await
    }

    /// Fetches the server's custom-field schema for this entity.
    pub async fn get_ad_hoc_schema(
        &self,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        self.call_kind(OperationKind::GetAdHocSchema, Invocation::AdHocSchema, api_version)
            .await
    }

    /// Attaches a file to an entity.
    pub async fn put_file(
        &self,
        id: impl Into<EntityId>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
        comment: Option<String>,
        api_version: Option<&str>,
    ) -> Result<Option<Value>, AcumaticaError> {
        let invocation = Invocation::File {
            id: id.into(),
            filename: filename.into(),
            data: data.into(),
            comment,
        };
        self.call_kind(OperationKind::PutFile, invocation, api_version)
            .await
    }
}

/// Every generated service, keyed by tag.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Service>,
}

impl ServiceRegistry {
    /// Binds service descriptions to a transport and endpoint version.
    pub fn bind<'a>(
        specs: impl IntoIterator<Item = &'a ServiceSpec>,
        transport: &Arc<Transport>,
        endpoint: &str,
        version: &str,
    ) -> Self {
        let services = specs
            .into_iter()
            .map(|spec| {
                let service = Service::new(spec.clone(), Arc::clone(transport), endpoint, version);
                (spec.tag.clone(), service)
            })
            .collect();
        Self { services }
    }

    pub fn get(&self, tag: &str) -> Option<&Service> {
        self.services.get(tag)
    }

    /// Like [`get`](Self::get), failing with [`ModelError::UnknownService`].
    pub fn service(&self, tag: &str) -> Result<&Service, ModelError> {
        self.get(tag).ok_or_else(|| ModelError::UnknownService {
            name: tag.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Service)> {
        self.services.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Describes every tagged service in `doc` and binds it in one step.
pub fn build_services(
    doc: &SchemaDocument,
    transport: &Arc<Transport>,
    endpoint: &str,
    version: &str,
) -> ServiceRegistry {
    ServiceRegistry::bind(describe_services(doc).values(), transport, endpoint, version)
}

fn query_params(options: Option<&QueryOptions>) -> Vec<(String, String)> {
    options.map(QueryOptions::to_params).unwrap_or_default()
}

fn extend(mut url: Url, segments: &[&str]) -> Result<Url, ClientError> {
    let base = url.to_string();
    url.path_segments_mut()
        .map_err(|()| ClientError::InvalidUrl(base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Builds the POST body of an action from an invocation payload.
///
/// The `entity` part is pruned; `parameters` values are wrapped in value
/// envelopes and omitted entirely when there are none.
pub fn action_body(invocation: &Map<String, Value>) -> Value {
    let entity = invocation
        .get("entity")
        .and_then(Value::as_object)
        .map(prune_entity)
        .unwrap_or_default();

    let mut body = Map::new();
    body.insert("entity".to_string(), Value::Object(entity));

    if let Some(params) = invocation
        .get("parameters")
        .and_then(Value::as_object)
        .filter(|p| !p.is_empty())
    {
        let wrapped = params
            .iter()
            .map(|(k, v)| (k.clone(), envelope(v)))
            .collect();
        body.insert("parameters".to_string(), Value::Object(wrapped));
    }
    Value::Object(body)
}

/// Keeps only the entity fields that carry a meaningful value.
///
/// ```rust
/// use acumatica_client::service::prune_entity;
/// use serde_json::json;
///
/// let entity = json!({"Name": {"value": "X"}, "Code": {"value": null}});
/// let pruned = prune_entity(entity.as_object().unwrap());
/// assert_eq!(serde_json::Value::Object(pruned), json!({"Name": {"value": "X"}}));
/// ```
pub fn prune_entity(entity: &Map<String, Value>) -> Map<String, Value> {
    entity
        .iter()
        .filter(|(_, v)| is_meaningful(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Object(map) => match map.get("value") {
            Some(inner) => !is_blank(inner),
            None => map.values().any(|v| !is_blank(v)),
        },
        Value::Array(items) => items.iter().any(|v| !is_blank(v)),
        other => !is_blank(other),
    }
}

/// `null`, `""`, `[]` and `{}`.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn envelope(value: &Value) -> Value {
    match value {
        Value::Object(map) if map.len() == 1 && map.contains_key("value") => value.clone(),
        other => {
            let mut wrapped = Map::with_capacity(1);
            wrapped.insert("value".to_string(), other.clone());
            Value::Object(wrapped)
        }
    }
}
