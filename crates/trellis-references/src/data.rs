//! The reference data handed to clients next to a rendered value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_lookup::backend::{EntryRecord, EntryTypeRecord, PropertyRecord};
use trellis_lookup::{AnyValueJson, EntryId, EntryTypeId, PropertyId};

/// Everything a client needs to render links and embedded lookups without
/// further round trips
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    pub entry_types: BTreeMap<EntryTypeId, EntryTypeRecord>,
    pub entries: BTreeMap<EntryId, EntryRecord>,
    pub properties: BTreeMap<PropertyId, PropertyRecord>,
    pub lookups: Vec<LookupRecord>,
}

/// One evaluated embedded lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_context: Option<EntryId>,
    pub lookup_expression: String,
    pub value: AnyValueJson,
}
