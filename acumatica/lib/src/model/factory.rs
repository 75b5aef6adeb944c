//! Schema entity definitions to model descriptions, and descriptions to types.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::types::{FieldDef, FieldType, ModelRegistry, ModelType};
use crate::error::SchemaError;
use crate::schema::{
    DefaultSpec, PrimitiveWrapper, SchemaDocument, TypeSpec, is_skipped_field, map_property,
    ref_name,
};

/// Description of one generated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeSpec,
    pub required: bool,
    pub default: DefaultSpec,
}

/// Description of one generated model, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    /// Built from an `allOf` aggregation (a top-level API entity).
    pub composite: bool,
    pub fields: Vec<FieldSpec>,
}

impl ModelSpec {
    /// Looks up a field description by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Describes every non-wrapper entity in the document.
///
/// ## Errors
///
/// Returns [`SchemaError::UnknownEntity`] if any property references an
/// entity the document does not declare.
#[instrument(skip(doc))]
pub fn describe_models(doc: &SchemaDocument) -> Result<BTreeMap<String, ModelSpec>, SchemaError> {
    let mut factory = ModelFactory::new(doc);
    if let Some(schemas) = doc.schemas() {
        for name in schemas.keys() {
            if PrimitiveWrapper::from_name(name).is_none() {
                factory.describe(name)?;
            }
        }
    }
    debug!(count = factory.built.len(), "described models");
    Ok(factory.built)
}

/// Describes a single entity.
///
/// Used by the differential cache to regenerate only changed entities.
pub fn describe_model(doc: &SchemaDocument, name: &str) -> Result<ModelSpec, SchemaError> {
    let mut factory = ModelFactory::new(doc);
    factory.describe(name).cloned()
}

/// Builds the full model registry for a document.
///
/// ## Examples
///
/// ```rust
/// use acumatica_client::model::build_models;
/// use acumatica_client::schema::SchemaDocument;
/// use serde_json::json;
///
/// let doc = SchemaDocument::from_value(json!({
///     "components": {"schemas": {
///         "Contact": {"type": "object", "properties": {
///             "DisplayName": {"$ref": "#/components/schemas/StringValue"}
///         }},
///         "StringValue": {"type": "object", "properties": {"value": {"type": "string"}}}
///     }}
/// })).unwrap();
///
/// let models = build_models(&doc).unwrap();
/// assert!(models.get("Contact").is_some());
/// assert!(models.get("StringValue").is_none());
/// ```
pub fn build_models(doc: &SchemaDocument) -> Result<ModelRegistry, SchemaError> {
    let specs = describe_models(doc)?;
    materialize(specs.values())
}

/// Turns model descriptions into a registry and resolves every entity link.
///
/// Resolution tolerates cycles: links hold weak pointers into the registry.
///
/// ## Errors
///
/// Returns [`SchemaError::UnknownEntity`] when a field names a model that
/// is not among `specs`.
pub fn materialize<'a>(
    specs: impl IntoIterator<Item = &'a ModelSpec>,
) -> Result<ModelRegistry, SchemaError> {
    let mut models = BTreeMap::new();
    for spec in specs {
        let fields = spec
            .fields
            .iter()
            .map(|f| FieldDef {
                name: f.name.clone(),
                ty: FieldType::from_spec(&f.ty),
                required: f.required,
                default: f.default,
            })
            .collect();
        let model = ModelType::new(spec.name.clone(), spec.composite, fields);
        models.insert(spec.name.clone(), Arc::new(model));
    }

    let registry = ModelRegistry::from_models(models);
    registry.resolve_links()?;
    Ok(registry)
}

/// Memoizing walker over `components.schemas`.
struct ModelFactory<'a> {
    doc: &'a SchemaDocument,
    built: BTreeMap<String, ModelSpec>,
}

impl<'a> ModelFactory<'a> {
    fn new(doc: &'a SchemaDocument) -> Self {
        Self {
            doc,
            built: BTreeMap::new(),
        }
    }

    fn describe(&mut self, name: &str) -> Result<&ModelSpec, SchemaError> {
        if !self.built.contains_key(name) {
            let spec = self.build(name)?;
            self.built.insert(name.to_string(), spec);
        }
        self.built
            .get(name)
            .ok_or_else(|| SchemaError::unknown_entity(name))
    }

    fn build(&self, name: &str) -> Result<ModelSpec, SchemaError> {
        let definition = self
            .doc
            .schema(name)
            .ok_or_else(|| SchemaError::unknown_entity(name))?;

        let composite = definition.get("allOf").is_some();
        let (properties, required) = flatten(self.doc, name, definition)?;

        let mut fields = Vec::with_capacity(properties.len());
        for (prop_name, fragment) in properties {
            if is_skipped_field(&prop_name) {
                continue;
            }
            let is_required = required.contains(prop_name.as_str());
            let (ty, default) = map_property(&fragment, is_required);
            for target in ty.model_refs() {
                if !self.doc.has_schema(target) {
                    return Err(SchemaError::unknown_entity(target));
                }
            }
            fields.push(FieldSpec {
                name: prop_name,
                ty,
                required: is_required,
                default,
            });
        }

        debug!(model = name, fields = fields.len(), composite, "described model");
        Ok(ModelSpec {
            name: name.to_string(),
            composite,
            fields,
        })
    }
}

/// The definition of `name` followed by every entity it inherits from
/// through `allOf` references, nearest first. Unknown names are left out.
///
/// A change to any of these definitions changes the generated model.
pub fn lineage<'a>(doc: &'a SchemaDocument, name: &'a str) -> Vec<&'a Value> {
    let mut chain: Vec<&Value> = doc.schema(name).into_iter().collect();
    let mut seen = BTreeSet::from([name]);
    let mut idx = 0;
    while idx < chain.len() {
        for base in base_refs(chain[idx]) {
            if seen.insert(base) {
                if let Some(found) = doc.schema(base) {
                    chain.push(found);
                }
            }
        }
        idx += 1;
    }
    chain
}

fn base_refs(definition: &Value) -> impl Iterator<Item = &str> {
    definition
        .get("allOf")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|member| member.get("$ref").and_then(Value::as_str))
        .map(ref_name)
}

/// Merges the property bags of a definition and collects its required names.
///
/// For `allOf` aggregations every member is absorbed in member order. A
/// `$ref` member contributes the referenced entity's own bags (so the
/// `Entity` base brings `id`); a later member redefining a property keeps
/// the original position.
fn flatten(
    doc: &SchemaDocument,
    name: &str,
    definition: &Value,
) -> Result<(Vec<(String, Value)>, BTreeSet<String>), SchemaError> {
    let mut flat = Flattened::default();
    let mut seen = BTreeSet::from([name.to_string()]);
    flat.absorb(doc, definition, &mut seen)?;
    Ok((flat.properties, flat.required))
}

#[derive(Default)]
struct Flattened {
    properties: Vec<(String, Value)>,
    required: BTreeSet<String>,
}

impl Flattened {
    fn absorb(
        &mut self,
        doc: &SchemaDocument,
        part: &Value,
        seen: &mut BTreeSet<String>,
    ) -> Result<(), SchemaError> {
        if let Some(reference) = part.get("$ref").and_then(Value::as_str) {
            let base = ref_name(reference);
            if !seen.insert(base.to_string()) {
                return Ok(());
            }
            let definition = doc
                .schema(base)
                .ok_or_else(|| SchemaError::unknown_entity(base))?;
            return self.absorb(doc, definition, seen);
        }

        if let Some(props) = part.get("properties").and_then(Value::as_object) {
            merge_properties(&mut self.properties, props);
        }
        if let Some(names) = part.get("required").and_then(Value::as_array) {
            self.required
                .extend(names.iter().filter_map(Value::as_str).map(String::from));
        }
        if let Some(members) = part.get("allOf").and_then(Value::as_array) {
            for member in members {
                self.absorb(doc, member, seen)?;
            }
        }
        Ok(())
    }
}

fn merge_properties(into: &mut Vec<(String, Value)>, props: &Map<String, Value>) {
    for (name, fragment) in props {
        match into.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = fragment.clone(),
            None => into.push((name.clone(), fragment.clone())),
        }
    }
}
