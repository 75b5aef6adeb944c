//! Mutable instances of generated models and their wire payloads.

use std::sync::Arc;

use serde_json::{Map, Number, Value};

use super::types::{FieldType, ModelType};
use crate::error::ModelError;
use crate::schema::{DefaultSpec, ScalarKind};

/// The value held by one field of a [`ModelInstance`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Scalar(Value),
    Model(ModelInstance),
    List(Vec<FieldValue>),
    /// A raw mapping, sent as-is.
    Map(Map<String, Value>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The scalar JSON value, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }

    pub fn as_model(&self) -> Option<&ModelInstance> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// JSON form used inside sequences: models recurse, everything else
    /// passes through without a value envelope.
    fn to_plain_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Scalar(v) => v.clone(),
            Self::Model(m) => Value::Object(m.to_payload()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_plain_json).collect()),
            Self::Map(m) => Value::Object(m.clone()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Object(map) => Self::Map(map),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            scalar => Self::Scalar(scalar),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Scalar(Value::String(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Value::Bool(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Value::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Scalar(Value::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, |n| Self::Scalar(Value::Number(n)))
    }
}

impl From<ModelInstance> for FieldValue {
    fn from(value: ModelInstance) -> Self {
        Self::Model(value)
    }
}

impl From<Map<String, Value>> for FieldValue {
    fn from(value: Map<String, Value>) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// One instance of a generated model.
///
/// Every instance owns its field values; list defaults are created per
/// instance, never shared.
///
/// ## Examples
///
/// ```rust,ignore
/// let mut contact = models.instantiate("Contact")?;
/// contact.set("DisplayName", "Jane Doe")?;
/// contact.set("Active", true)?;
///
/// let payload = contact.to_payload();
/// assert_eq!(payload["DisplayName"], json!({"value": "Jane Doe"}));
/// ```
#[derive(Debug, Clone)]
pub struct ModelInstance {
    model: Arc<ModelType>,
    values: Vec<FieldValue>,
}

impl PartialEq for ModelInstance {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name() && self.values == other.values
    }
}

impl ModelInstance {
    /// Creates an instance with every field at its declared default.
    pub fn new(model: Arc<ModelType>) -> Self {
        let values = model
            .fields()
            .iter()
            .map(|f| match f.default {
                DefaultSpec::None => FieldValue::Null,
                DefaultSpec::False => FieldValue::Scalar(Value::Bool(false)),
                DefaultSpec::EmptyList => FieldValue::List(Vec::new()),
            })
            .collect();
        Self { model, values }
    }

    /// The generated type of this instance.
    pub fn model(&self) -> &Arc<ModelType> {
        &self.model
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    fn index(&self, field: &str) -> Result<usize, ModelError> {
        self.model
            .field_index(field)
            .ok_or_else(|| ModelError::UnknownField {
                model: self.model.name().to_string(),
                field: field.to_string(),
            })
    }

    /// Current value of a field.
    pub fn get(&self, field: &str) -> Result<&FieldValue, ModelError> {
        let idx = self.index(field)?;
        Ok(&self.values[idx])
    }

    /// Sets a field, coercing scalars to the declared type.
    ///
    /// ## Errors
    ///
    /// Returns [`ModelError::UnknownField`] for undeclared fields and
    /// [`ModelError::InvalidValue`] when the value cannot be coerced.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), ModelError> {
        let idx = self.index(field)?;
        let def = &self.model.fields()[idx];
        let coerced = coerce(&def.ty, value.into()).ok_or_else(|| ModelError::InvalidValue {
            model: self.model.name().to_string(),
            field: field.to_string(),
            expected: def.ty.to_string(),
        })?;
        self.values[idx] = coerced;
        Ok(())
    }

    /// Mutable access to a list field, creating the list if it is unset.
    pub fn list_mut(&mut self, field: &str) -> Result<&mut Vec<FieldValue>, ModelError> {
        let idx = self.index(field)?;
        let not_a_list = || ModelError::InvalidValue {
            model: self.model.name().to_string(),
            field: field.to_string(),
            expected: self.model.fields()[idx].ty.to_string(),
        };
        if self.model.fields()[idx].ty.list_item().is_none() {
            return Err(not_a_list());
        }
        if !matches!(self.values[idx], FieldValue::List(_)) {
            self.values[idx] = FieldValue::List(Vec::new());
        }
        let err = not_a_list();
        match &mut self.values[idx] {
            FieldValue::List(items) => Ok(items),
            _ => Err(err),
        }
    }

    /// Serializes to the wire payload.
    ///
    /// Unset fields are omitted. Scalars are wrapped as `{"value": ...}`;
    /// lists, nested models and raw mappings are not.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        for (def, value) in self.model.fields().iter().zip(&self.values) {
            let json = match value {
                FieldValue::Null => continue,
                FieldValue::Scalar(v) => {
                    let mut envelope = Map::with_capacity(1);
                    envelope.insert("value".to_string(), v.clone());
                    Value::Object(envelope)
                }
                FieldValue::Model(m) => Value::Object(m.to_payload()),
                FieldValue::List(items) => {
                    Value::Array(items.iter().map(FieldValue::to_plain_json).collect())
                }
                FieldValue::Map(m) => Value::Object(m.clone()),
            };
            payload.insert(def.name.clone(), json);
        }
        payload
    }

    /// Rebuilds an instance from a wire payload, unwrapping value envelopes.
    ///
    /// Keys the model does not declare are ignored.
    pub fn from_payload(model: Arc<ModelType>, payload: &Map<String, Value>) -> Self {
        let mut instance = Self::new(model);
        let model = Arc::clone(&instance.model);
        for (idx, def) in model.fields().iter().enumerate() {
            if let Some(json) = payload.get(&def.name) {
                instance.values[idx] = decode(&def.ty, json);
            }
        }
        instance
    }
}

fn decode(ty: &FieldType, json: &Value) -> FieldValue {
    match (ty.inner(), json) {
        (_, Value::Null) => FieldValue::Null,
        (FieldType::Model(link), Value::Object(map)) => match link.get() {
            Some(target) => FieldValue::Model(ModelInstance::from_payload(target, map)),
            None => FieldValue::Map(map.clone()),
        },
        (FieldType::List(item), Value::Array(items)) => {
            FieldValue::List(items.iter().map(|v| decode(item, v)).collect())
        }
        (FieldType::Scalar(_), Value::Object(map)) => match map.get("value") {
            Some(inner) => FieldValue::from(inner.clone()),
            None => FieldValue::Map(map.clone()),
        },
        (FieldType::Any, Value::Object(map)) if map.len() == 1 && map.contains_key("value") => {
            FieldValue::from(map["value"].clone())
        }
        (_, other) => FieldValue::from(other.clone()),
    }
}

fn coerce(ty: &FieldType, value: FieldValue) -> Option<FieldValue> {
    match (ty.inner(), value) {
        (_, FieldValue::Null) => Some(FieldValue::Null),
        (FieldType::Any, value) => Some(value),
        (FieldType::Scalar(kind), FieldValue::Scalar(v)) => {
            coerce_scalar(*kind, v).map(FieldValue::Scalar)
        }
        (FieldType::Model(link), FieldValue::Model(m)) => {
            (m.name() == link.name()).then_some(FieldValue::Model(m))
        }
        (FieldType::Model(_), FieldValue::Map(m)) => Some(FieldValue::Map(m)),
        (FieldType::List(item), FieldValue::List(items)) => items
            .into_iter()
            .map(|v| coerce(item, v))
            .collect::<Option<Vec<_>>>()
            .map(FieldValue::List),
        _ => None,
    }
}

fn coerce_scalar(kind: ScalarKind, value: Value) -> Option<Value> {
    match (kind, value) {
        (ScalarKind::String, Value::String(s)) => Some(Value::String(s)),
        (ScalarKind::String, v @ (Value::Number(_) | Value::Bool(_))) => {
            Some(Value::String(v.to_string()))
        }
        (ScalarKind::DateTime, Value::String(s)) => Some(Value::String(s)),
        (ScalarKind::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (ScalarKind::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (ScalarKind::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Some(Value::Number(n))
            } else {
                // `i64::MAX as f64` rounds up to 2^63, which is out of range.
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| Value::from(f as i64))
            }
        }
        (ScalarKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (ScalarKind::Decimal, Value::Number(n)) => Some(Value::Number(n)),
        (ScalarKind::Decimal, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}
