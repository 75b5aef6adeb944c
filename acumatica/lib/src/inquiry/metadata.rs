//! Generic inquiry discovery from the OData `$metadata` document.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::hash::hash_json;
use crate::naming::identifier_from_display;

/// One column of an inquiry result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryField {
    pub name: String,
    /// EDM type name, e.g. `Edm.Decimal`.
    pub edm_type: String,
}

/// A generic inquiry published through OData.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquirySpec {
    /// Display name of the entity set, used in the request URL.
    pub name: String,
    pub method_name: String,
    pub entity_type: String,
    pub fields: Vec<InquiryField>,
}

impl InquirySpec {
    /// Hash of the inquiry's name and entity type definition.
    pub fn content_hash(&self) -> u64 {
        let fields: Vec<_> = self
            .fields
            .iter()
            .map(|f| json!({"name": f.name, "type": f.edm_type}))
            .collect();
        hash_json(&json!({
            "name": self.name,
            "entity_type": self.entity_type,
            "fields": fields,
        }))
    }
}

/// Parses the metadata document into inquiry descriptions, keyed by
/// inquiry name.
///
/// Entity sets whose entity type is not declared get an empty field list.
pub fn parse_metadata(xml: &str) -> Result<BTreeMap<String, InquirySpec>, ValidationError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut types: BTreeMap<String, Vec<InquiryField>> = BTreeMap::new();
    let mut current: Option<(String, Vec<InquiryField>)> = None;
    let mut sets: Vec<(String, String)> = Vec::new();

    loop {
        let (element, self_closing) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                if e.local_name().as_ref() == b"EntityType" {
                    if let Some((name, fields)) = current.take() {
                        types.insert(name, fields);
                    }
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        match element.local_name().as_ref() {
            b"EntityType" => {
                let name = attribute(&reader, &element, b"Name")?.unwrap_or_default();
                if self_closing {
                    types.insert(name, Vec::new());
                } else {
                    current = Some((name, Vec::new()));
                }
            }
            b"Property" => {
                if let Some((_, fields)) = current.as_mut() {
                    let name = attribute(&reader, &element, b"Name")?;
                    let edm_type = attribute(&reader, &element, b"Type")?;
                    if let Some(name) = name {
                        fields.push(InquiryField {
                            name,
                            edm_type: edm_type.unwrap_or_default(),
                        });
                    }
                }
            }
            b"EntitySet" => {
                let name = attribute(&reader, &element, b"Name")?;
                let entity_type = attribute(&reader, &element, b"EntityType")?;
                if let (Some(name), Some(entity_type)) = (name, entity_type) {
                    let local = entity_type
                        .rsplit('.')
                        .next()
                        .unwrap_or(&entity_type)
                        .to_string();
                    sets.push((name, local));
                }
            }
            _ => {}
        }
    }

    let mut inquiries = BTreeMap::new();
    let mut method_names: BTreeMap<String, String> = BTreeMap::new();
    for (name, entity_type) in sets {
        let method_name = identifier_from_display(&name);
        if let Some(previous) = method_names.insert(method_name.clone(), name.clone()) {
            warn!(%method_name, %previous, inquiry = %name, "duplicate inquiry method name, keeping the last");
            inquiries.remove(&previous);
        }
        let fields = types.get(&entity_type).cloned().unwrap_or_default();
        inquiries.insert(
            name.clone(),
            InquirySpec {
                name,
                method_name,
                entity_type,
                fields,
            },
        );
    }
    debug!(count = inquiries.len(), "parsed generic inquiries");
    Ok(inquiries)
}

fn attribute(
    reader: &Reader<&[u8]>,
    element: &BytesStart<'_>,
    key: &[u8],
) -> Result<Option<String>, ValidationError> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == key {
            let value = attr.decode_and_unescape_value(reader.decoder())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
