//! Mapping of schema property fragments to semantic field types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use super::document::ref_name;

/// Property names managed by the server; never part of a generated model.
const SKIPPED_FIELDS: [&str; 4] = ["note", "rowNumber", "error", "_links"];

/// Returns `true` for server-managed metadata properties.
pub fn is_skipped_field(name: &str) -> bool {
    SKIPPED_FIELDS.contains(&name)
}

/// Scalar kinds a field can hold once value envelopes are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    String,
    Decimal,
    Boolean,
    DateTime,
    Integer,
}

/// Schema types that only wrap a single scalar `value` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, Display)]
pub enum PrimitiveWrapper {
    StringValue,
    DecimalValue,
    BooleanValue,
    DateTimeValue,
    GuidValue,
    IntValue,
    ShortValue,
    LongValue,
    ByteValue,
    DoubleValue,
}

impl PrimitiveWrapper {
    /// Looks up a wrapper by schema name.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// The scalar the wrapper collapses into.
    pub fn scalar(self) -> ScalarKind {
        match self {
            Self::StringValue | Self::GuidValue => ScalarKind::String,
            Self::DecimalValue | Self::DoubleValue => ScalarKind::Decimal,
            Self::BooleanValue => ScalarKind::Boolean,
            Self::DateTimeValue => ScalarKind::DateTime,
            Self::IntValue | Self::ShortValue | Self::LongValue | Self::ByteValue => {
                ScalarKind::Integer
            }
        }
    }

    /// Default value for a field of this wrapper type.
    pub fn default_spec(self) -> DefaultSpec {
        match self {
            Self::BooleanValue => DefaultSpec::False,
            _ => DefaultSpec::None,
        }
    }
}

/// The semantic type of a generated field.
///
/// Entity references are kept by name here; they become live links to
/// generated model types when the registry is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeSpec {
    Scalar(ScalarKind),
    Model(String),
    List(Box<TypeSpec>),
    Optional(Box<TypeSpec>),
    Any,
}

impl TypeSpec {
    /// Wraps in [`TypeSpec::Optional`] unless already optional.
    pub fn optional(self) -> Self {
        match self {
            Self::Optional(_) => self,
            other => Self::Optional(Box::new(other)),
        }
    }

    /// The type with any optionality marker removed.
    pub fn inner(&self) -> &TypeSpec {
        match self {
            Self::Optional(inner) => inner.inner(),
            other => other,
        }
    }

    /// Names of every entity this type refers to.
    pub fn model_refs(&self) -> Vec<&str> {
        match self {
            Self::Model(name) => vec![name.as_str()],
            Self::List(inner) | Self::Optional(inner) => inner.model_refs(),
            Self::Scalar(_) | Self::Any => Vec::new(),
        }
    }
}

impl std::fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Model(name) => write!(f, "{name}"),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Optional(inner) => write!(f, "optional[{inner}]"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Initial value of a field on a freshly created instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultSpec {
    None,
    False,
    /// A new, unshared empty list per instance.
    EmptyList,
}

/// Maps one property fragment to its field type and default.
///
/// Rules apply in order: primitive wrapper reference, entity reference,
/// array, inline primitive, then `any`. The result is optional unless
/// `required` is set.
///
/// ## Examples
///
/// ```rust
/// use acumatica_client::schema::{map_property, DefaultSpec, ScalarKind, TypeSpec};
/// use serde_json::json;
///
/// let (ty, default) = map_property(&json!({"$ref": "#/components/schemas/StringValue"}), false);
/// assert_eq!(ty, TypeSpec::Scalar(ScalarKind::String).optional());
/// assert_eq!(default, DefaultSpec::None);
/// ```
pub fn map_property(fragment: &Value, required: bool) -> (TypeSpec, DefaultSpec) {
    let (ty, default) = map_unwrapped(fragment);
    if required { (ty, default) } else { (ty.optional(), default) }
}

fn map_unwrapped(fragment: &Value) -> (TypeSpec, DefaultSpec) {
    if let Some(reference) = fragment.get("$ref").and_then(Value::as_str) {
        let name = ref_name(reference);
        return match PrimitiveWrapper::from_name(name) {
            Some(wrapper) => (TypeSpec::Scalar(wrapper.scalar()), wrapper.default_spec()),
            None => (TypeSpec::Model(name.to_string()), DefaultSpec::None),
        };
    }

    let declared = fragment.get("type").and_then(Value::as_str);
    match declared {
        Some("array") => {
            let items = fragment.get("items").unwrap_or(&Value::Null);
            let (item, _) = map_property(items, false);
            (TypeSpec::List(Box::new(item)), DefaultSpec::EmptyList)
        }
        Some("string") => {
            let kind = match fragment.get("format").and_then(Value::as_str) {
                Some("date-time") => ScalarKind::DateTime,
                _ => ScalarKind::String,
            };
            (TypeSpec::Scalar(kind), DefaultSpec::None)
        }
        Some("integer") => (TypeSpec::Scalar(ScalarKind::Integer), DefaultSpec::None),
        Some("number") => (TypeSpec::Scalar(ScalarKind::Decimal), DefaultSpec::None),
        Some("boolean") => (TypeSpec::Scalar(ScalarKind::Boolean), DefaultSpec::None),
        _ => (TypeSpec::Any, DefaultSpec::None),
    }
}
