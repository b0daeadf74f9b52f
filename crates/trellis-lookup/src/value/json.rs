//! Canonical JSON form of concrete values
//!
//! `{ "type": "<Kind>", ...fields, "annotations"?: { name: <value> } }`.
//! This shape is consumed by clients and by reference extraction, so field
//! names are part of the public contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{LookupValue, ValueKind};
use crate::error::{LookupError, LookupResult};
use crate::ids::{EntryId, EntryTypeId, FactId, PropertyId};

/// A serialized value with its annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyValueJson {
    #[serde(flatten)]
    pub value: ValueJson,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, AnyValueJson>,
}

impl AnyValueJson {
    pub fn new(value: ValueJson) -> Self {
        Self {
            value,
            annotations: BTreeMap::new(),
        }
    }
}

impl From<ValueJson> for AnyValueJson {
    fn from(value: ValueJson) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ValueJson {
    Null,
    Boolean {
        value: bool,
    },
    /// Decimal string, since values may exceed 64 bits.
    Integer {
        value: String,
    },
    String {
        value: String,
    },
    /// `YYYY-MM-DD`
    Date {
        value: String,
    },
    Entry {
        id: EntryId,
    },
    EntryType {
        id: EntryTypeId,
    },
    Property {
        id: PropertyId,
    },
    #[serde(rename_all = "camelCase")]
    File {
        filename: String,
        url: String,
        content_type: String,
        size: i64,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        entry_id: EntryId,
        alt_text: String,
        image_url: String,
        content_type: String,
        size: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blur_hash: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        border_color: Option<String>,
        /// Inline markdown.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    InlineMarkdownString {
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    Page {
        values: Vec<AnyValueJson>,
        page_size: u64,
        started_at: u64,
        total_count: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<PageSourceJson>,
    },
    Graph {
        entries: Vec<GraphEntryJson>,
        rels: Vec<GraphRelJson>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        error_class: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSourceJson {
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEntryJson {
    pub entry_id: EntryId,
    pub name: String,
    pub entry_type_id: EntryTypeId,
    pub is_focus_entry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRelJson {
    pub rel_id: FactId,
    pub rel_type_id: PropertyId,
    pub from_entry_id: EntryId,
    pub to_entry_id: EntryId,
}

impl ValueJson {
    /// The `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean { .. } => "Boolean",
            Self::Integer { .. } => "Integer",
            Self::String { .. } => "String",
            Self::Date { .. } => "Date",
            Self::Entry { .. } => "Entry",
            Self::EntryType { .. } => "EntryType",
            Self::Property { .. } => "Property",
            Self::File { .. } => "File",
            Self::Image { .. } => "Image",
            Self::InlineMarkdownString { .. } => "InlineMarkdownString",
            Self::Page { .. } => "Page",
            Self::Graph { .. } => "Graph",
            Self::Error { .. } => "Error",
        }
    }
}

impl LookupValue {
    /// Serializes a concrete value. Lazy values must be made concrete first.
    pub fn to_json(&self) -> LookupResult<AnyValueJson> {
        let (base, annotations) = match self {
            Self::Annotated(base, annotations) => (base.as_ref(), Some(annotations)),
            other => (other, None),
        };
        let value = base_to_json(base)?;
        let mut json = AnyValueJson::new(value);
        if let Some(annotations) = annotations {
            for (name, value) in annotations {
                json.annotations.insert(name.clone(), value.to_json()?);
            }
        }
        Ok(json)
    }
}

fn base_to_json(value: &LookupValue) -> LookupResult<ValueJson> {
    Ok(match value {
        LookupValue::Null => ValueJson::Null,
        LookupValue::Boolean(value) => ValueJson::Boolean { value: *value },
        LookupValue::Integer(value) => ValueJson::Integer {
            value: value.to_string(),
        },
        LookupValue::String(value) => ValueJson::String {
            value: value.clone(),
        },
        LookupValue::Date(date) => ValueJson::Date {
            value: date.format("%Y-%m-%d").to_string(),
        },
        LookupValue::Entry(id) => ValueJson::Entry { id: id.clone() },
        LookupValue::EntryType(id) => ValueJson::EntryType { id: id.clone() },
        LookupValue::Property(id) => ValueJson::Property { id: id.clone() },
        LookupValue::File(file) => ValueJson::File {
            filename: file.filename.clone(),
            url: file.url.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
        },
        LookupValue::Image(image) => ValueJson::Image {
            entry_id: image.entry_id.clone(),
            alt_text: image.alt_text.clone(),
            image_url: image.image_url.clone(),
            content_type: image.content_type.clone(),
            size: image.size,
            width: image.width,
            height: image.height,
            blur_hash: image.blur_hash.clone(),
            border_color: image.border_color.clone(),
            caption: image.caption.clone(),
        },
        LookupValue::InlineMarkdown(value) => ValueJson::InlineMarkdownString {
            value: value.clone(),
        },
        LookupValue::Page(page) => ValueJson::Page {
            values: page
                .values
                .iter()
                .map(LookupValue::to_json)
                .collect::<LookupResult<Vec<_>>>()?,
            page_size: page.page_size,
            started_at: page.started_at,
            total_count: page.total_count,
            source: page.source.as_ref().map(|source| PageSourceJson {
                expr: source.expression.to_string(),
                entry_id: source.entry_id.clone(),
            }),
        },
        LookupValue::Graph(graph) => ValueJson::Graph {
            entries: graph
                .entries
                .iter()
                .map(|entry| GraphEntryJson {
                    entry_id: entry.entry_id.clone(),
                    name: entry.name.clone(),
                    entry_type_id: entry.entry_type_id.clone(),
                    is_focus_entry: entry.is_focus_entry,
                })
                .collect(),
            rels: graph
                .rels
                .iter()
                .map(|rel| GraphRelJson {
                    rel_id: rel.rel_id.clone(),
                    rel_type_id: rel.rel_type_id.clone(),
                    from_entry_id: rel.from_entry_id.clone(),
                    to_entry_id: rel.to_entry_id.clone(),
                })
                .collect(),
        },
        LookupValue::Error(error) => ValueJson::Error {
            error_class: error.error_class.clone(),
            message: error.message.clone(),
        },
        LookupValue::Annotated(..) => {
            return Err(LookupError::internal("annotated value nested inside another"))
        }
        lazy @ (LookupValue::LazyEntrySet(_)
        | LookupValue::LazyList(_)
        | LookupValue::LazyRows(_)) => {
            return Err(not_concrete(lazy.kind()));
        }
    })
}

fn not_concrete(kind: ValueKind) -> LookupError {
    LookupError::internal(format!(
        "{kind} values must be made concrete before they are serialized"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Annotations, ErrorValue, LazyList, PageValue};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn integers_serialize_as_decimal_strings() {
        let big: num_bigint::BigInt = "123456789012345678901234567890".parse().unwrap();
        let json = serde_json::to_value(LookupValue::Integer(big).to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({"type": "Integer", "value": "123456789012345678901234567890"})
        );
    }

    #[test]
    fn page_shape_is_stable() {
        let mut annotations = Annotations::new();
        annotations.insert("distance".to_string(), LookupValue::integer(1));
        let page = LookupValue::Page(PageValue::new(
            vec![LookupValue::entry("_a").annotate(annotations)],
            0,
            10,
            1,
        ));
        let json = serde_json::to_value(page.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "Page",
                "values": [{
                    "type": "Entry",
                    "id": "_a",
                    "annotations": {"distance": {"type": "Integer", "value": "1"}}
                }],
                "pageSize": 10,
                "startedAt": 0,
                "totalCount": 1
            })
        );
    }

    #[test]
    fn dates_and_errors_serialize() {
        let date = LookupValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(
            serde_json::to_value(date.to_json().unwrap()).unwrap(),
            json!({"type": "Date", "value": "2024-02-29"})
        );

        let error = LookupValue::Error(ErrorValue {
            error_class: "LookupTypeError".to_string(),
            message: "bad".to_string(),
        });
        assert_eq!(
            serde_json::to_value(error.to_json().unwrap()).unwrap(),
            json!({"type": "Error", "errorClass": "LookupTypeError", "message": "bad"})
        );
    }

    #[test]
    fn lazy_values_refuse_to_serialize() {
        let err = LookupValue::LazyList(LazyList::new(vec![]))
            .to_json()
            .unwrap_err();
        assert!(!err.is_evaluation_error());
    }

    #[test]
    fn json_deserializes_back() {
        let json = json!({
            "type": "Image",
            "entryId": "_img",
            "altText": "A pine",
            "imageUrl": "https://img.example/pine.webp",
            "contentType": "image/webp",
            "size": 1024,
            "caption": "See [[/entry/_b]]",
            "annotations": {"rank": {"type": "Integer", "value": "2"}}
        });
        let value: AnyValueJson = serde_json::from_value(json).unwrap();
        assert_eq!(value.value.type_name(), "Image");
        assert_eq!(value.annotations.len(), 1);
    }
}
