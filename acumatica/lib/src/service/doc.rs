//! Human-readable signatures for generated service methods.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kind::OperationKind;
use crate::schema::{SchemaDocument, ref_name};

/// One documented parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDoc {
    pub name: String,
    pub ty: String,
    pub description: String,
    pub optional: bool,
}

impl ParamDoc {
    fn new(name: &str, ty: impl Into<String>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.into(),
            description: description.to_string(),
            optional: false,
        }
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// What a generated method returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum ReturnDoc {
    Entity(String),
    EntityList(String),
    Json,
    Nothing,
    JsonOrNothing,
}

impl fmt::Display for ReturnDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(model) => write!(f, "A {model} entity."),
            Self::EntityList(model) => write!(f, "A list of {model} entities."),
            Self::Json => write!(f, "The JSON response from the API."),
            Self::Nothing => write!(f, "Nothing."),
            Self::JsonOrNothing => write!(f, "The JSON response from the API, or nothing."),
        }
    }
}

/// Signature and description of one generated method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDoc {
    pub summary: String,
    pub params: Vec<ParamDoc>,
    pub returns: ReturnDoc,
}

impl fmt::Display for OperationDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        if !self.params.is_empty() {
            writeln!(f)?;
            writeln!(f, "Args:")?;
            for p in &self.params {
                let optional = if p.optional { ", optional" } else { "" };
                writeln!(f, "    {} ({}{}): {}", p.name, p.ty, optional, p.description)?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Returns:")?;
        write!(f, "    {}", self.returns)
    }
}

/// Derives the documented signature of one operation.
///
/// `details` is the operation object from `paths`; parameter `$ref`s are
/// resolved against `schema`.
pub fn describe_operation(
    schema: &SchemaDocument,
    entity: &str,
    operation_id: &str,
    details: &Value,
) -> OperationDoc {
    let summary = details
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("No summary available.");
    let summary = format!("{} for the {entity} entity.", summary.trim_end_matches('.'));

    let kind = OperationKind::classify(operation_id);
    let mut params = Vec::new();

    if let Some(body) = details.get("requestBody") {
        let model = body
            .pointer("/content/application~1json/schema/$ref")
            .and_then(Value::as_str)
            .map(ref_name);
        params.push(match (model, kind) {
            (Some(model), Some(OperationKind::InvokeAction)) => {
                ParamDoc::new("invocation", model, "The action invocation data.")
            }
            (Some(model), _) => ParamDoc::new(
                "data",
                format!("{model} | map"),
                "The entity data to create or update.",
            ),
            (None, _) => ParamDoc::new("data", "map", "The entity data."),
        });
    }

    let has_id_param = details
        .get("parameters")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|p| schema.resolve_parameter(p))
        .any(|p| {
            p.get("in").and_then(Value::as_str) == Some("path")
                && p.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.to_lowercase().contains("id"))
        });
    if has_id_param {
        params.push(ParamDoc::new(
            "entity_id",
            "str | list[str]",
            "The primary key of the entity.",
        ));
    }

    if kind == Some(OperationKind::PutFile) {
        params.push(ParamDoc::new("filename", "str", "The name of the file to upload."));
        params.push(ParamDoc::new("data", "bytes", "The file content."));
        params.push(ParamDoc::new("comment", "str", "A comment about the file.").optional());
    }

    if kind.is_some_and(OperationKind::takes_options) {
        params.push(ParamDoc::new("options", "QueryOptions", "OData query options.").optional());
    }

    params.push(
        ParamDoc::new(
            "api_version",
            "str",
            "The API version to use for this request.",
        )
        .optional(),
    );

    OperationDoc {
        summary,
        params,
        returns: describe_return(details),
    }
}

fn describe_return(details: &Value) -> ReturnDoc {
    let responses = details.get("responses");
    let ok_schema = responses.and_then(|r| r.pointer("/200/content/application~1json/schema"));

    match ok_schema {
        Some(schema) => {
            if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
                ReturnDoc::Entity(ref_name(reference).to_string())
            } else if schema.get("type").and_then(Value::as_str) == Some("array") {
                match schema.pointer("/items/$ref").and_then(Value::as_str) {
                    Some(reference) => ReturnDoc::EntityList(ref_name(reference).to_string()),
                    None => ReturnDoc::Json,
                }
            } else {
                ReturnDoc::Json
            }
        }
        None if responses.and_then(|r| r.get("204")).is_some() => ReturnDoc::Nothing,
        None => ReturnDoc::JsonOrNothing,
    }
}
