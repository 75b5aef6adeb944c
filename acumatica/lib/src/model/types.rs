//! Materialized model types and the registry that owns them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::error::{ModelError, SchemaError};
use crate::schema::{DefaultSpec, ScalarKind, TypeSpec};

use super::instance::ModelInstance;

/// A reference from a field to another generated model.
///
/// Starts out pending and is bound exactly once when the registry resolves
/// links; binding again is a no-op. The pointer is weak so that models
/// referring to each other do not keep each other alive.
pub struct ModelLink {
    name: String,
    target: OnceLock<Weak<ModelType>>,
}

impl ModelLink {
    fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: OnceLock::new(),
        }
    }

    /// Name of the referenced entity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the link has been bound to a registry entry.
    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    /// The referenced model, while its registry is alive.
    pub fn get(&self) -> Option<Arc<ModelType>> {
        self.target.get().and_then(Weak::upgrade)
    }

    fn bind(&self, model: &Arc<ModelType>) {
        let _ = self.target.set(Arc::downgrade(model));
    }
}

impl fmt::Debug for ModelLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLink")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Field type with entity references as live links.
#[derive(Debug)]
pub enum FieldType {
    Scalar(ScalarKind),
    Model(ModelLink),
    List(Box<FieldType>),
    Optional(Box<FieldType>),
    Any,
}

impl FieldType {
    /// Builds an unresolved field type from its description.
    pub fn from_spec(spec: &TypeSpec) -> Self {
        match spec {
            TypeSpec::Scalar(kind) => Self::Scalar(*kind),
            TypeSpec::Model(name) => Self::Model(ModelLink::pending(name.as_str())),
            TypeSpec::List(inner) => Self::List(Box::new(Self::from_spec(inner))),
            TypeSpec::Optional(inner) => Self::Optional(Box::new(Self::from_spec(inner))),
            TypeSpec::Any => Self::Any,
        }
    }

    /// The type with any optionality marker removed.
    pub fn inner(&self) -> &FieldType {
        match self {
            Self::Optional(inner) => inner.inner(),
            other => other,
        }
    }

    /// The model link of a (possibly optional) model-typed field.
    pub fn model_link(&self) -> Option<&ModelLink> {
        match self.inner() {
            Self::Model(link) => Some(link),
            _ => None,
        }
    }

    /// The element type of a (possibly optional) list field.
    pub fn list_item(&self) -> Option<&FieldType> {
        match self.inner() {
            Self::List(item) => Some(item),
            _ => None,
        }
    }

    fn links<'a>(&'a self, out: &mut Vec<&'a ModelLink>) {
        match self {
            Self::Model(link) => out.push(link),
            Self::List(inner) | Self::Optional(inner) => inner.links(out),
            Self::Scalar(_) | Self::Any => {}
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Model(link) => write!(f, "{}", link.name()),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Optional(inner) => write!(f, "optional[{inner}]"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// One field of a generated model.
#[derive(Debug)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub default: DefaultSpec,
}

/// A record type generated from one entity definition.
#[derive(Debug)]
pub struct ModelType {
    name: String,
    composite: bool,
    fields: Vec<FieldDef>,
}

impl ModelType {
    pub(crate) fn new(name: String, composite: bool, fields: Vec<FieldDef>) -> Self {
        Self {
            name,
            composite,
            fields,
        }
    }

    /// The source entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` for top-level API entities (`allOf` aggregations).
    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn links(&self) -> Vec<&ModelLink> {
        let mut out = Vec::new();
        for field in &self.fields {
            field.ty.links(&mut out);
        }
        out
    }
}

/// Immutable name → model mapping produced by one generation pass.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<ModelType>>,
}

impl ModelRegistry {
    pub(crate) fn from_models(models: BTreeMap<String, Arc<ModelType>>) -> Self {
        Self { models }
    }

    /// Binds every pending link to the registry entry it names.
    pub(crate) fn resolve_links(&self) -> Result<(), SchemaError> {
        for model in self.models.values() {
            for link in model.links() {
                let target = self
                    .models
                    .get(link.name())
                    .ok_or_else(|| SchemaError::unknown_entity(link.name()))?;
                link.bind(target);
            }
        }
        Ok(())
    }

    /// Looks up a model by entity name.
    pub fn get(&self, name: &str) -> Option<&Arc<ModelType>> {
        self.models.get(name)
    }

    /// Creates a new instance of the named model with default field values.
    pub fn instantiate(&self, name: &str) -> Result<ModelInstance, ModelError> {
        self.get(name)
            .map(|model| ModelInstance::new(Arc::clone(model)))
            .ok_or_else(|| ModelError::UnknownModel {
                name: name.to_string(),
            })
    }

    /// Model names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ModelType>)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
