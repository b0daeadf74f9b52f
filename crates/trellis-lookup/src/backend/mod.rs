//! Graph Backend Boundary
//!
//! The evaluator never talks to a database directly. Everything it needs is a
//! read against a [`GraphTransaction`], which the caller opens and owns for
//! the duration of one evaluation.
//!
//! ## Architecture
//!
//! - **Entry-set reads**: `fetch_entry_set` / `count_entry_set` take a composed
//!   [`EntrySetQuery`] and return one window or one count per call
//! - **Row reads**: `fetch_rows` / `count_rows` drive row-backed lazy iterables
//! - **Point reads**: entries, entry types, properties, facts and features by id
//!
//! Two implementations ship with the crate: [`MemoryGraph`] over an in-memory
//! [`GraphSnapshot`], and [`CypherTransaction`], which renders every call to
//! parameterised Cypher and hands it to a [`CypherClient`].

mod cypher_client;
mod memory;

pub use cypher_client::{CypherClient, CypherTransaction};
pub use memory::{GraphSnapshot, MemoryGraph, MemoryStats, SiteSnapshot};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{EntryId, EntryTypeId, FactId, PropertyId, SiteId};
use crate::query::{EntrySetQuery, RowQuery, Window};

// ============================================================================
// Errors
// ============================================================================

/// Error reported by a graph backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Could not decode backend row: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type for backend reads
pub type BackendResult<T> = Result<T, BackendError>;

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

// ============================================================================
// Records
// ============================================================================

/// How a property stores its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Facts hold a lookup expression producing a value.
    Value,
    /// Relationship facts forming the "is a" hierarchy.
    IsA,
    /// Any other relationship between two entries.
    RelatesTo,
}

impl PropertyKind {
    pub fn is_relationship(self) -> bool {
        !matches!(self, Self::Value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Value => "Value",
            Self::IsA => "IsA",
            Self::RelatesTo => "RelatesTo",
        }
    }
}

/// Direction of a one-hop relationship read, relative to the given entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Facts stored on the given entries (entry -> other).
    #[serde(rename = "from")]
    Outgoing,
    /// Facts pointing at the given entries (other -> entry).
    #[serde(rename = "to")]
    Incoming,
    Both,
}

impl Direction {
    /// Parses the surface spelling: `from`, `to` or `both`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "from" => Some(Self::Outgoing),
            "to" => Some(Self::Incoming),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outgoing => "from",
            Self::Incoming => "to",
            Self::Both => "both",
        }
    }
}

/// Which relationship facts a `relationships` read returns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationshipFilter {
    /// Only `IsA` facts, whatever their property.
    IsA,
    /// Facts of one property.
    Property(PropertyId),
    /// Every relationship fact.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub id: EntryId,
    pub name: String,
    pub friendly_id: String,
    pub entry_type: EntryTypeId,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryTypeRecord {
    pub id: EntryTypeId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: PropertyId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub applies_to: Vec<EntryTypeId>,
    #[serde(default)]
    pub inheritable: bool,
    /// Lookup expression used when an entry has no facts for this property.
    #[serde(default, rename = "default")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub rank: i64,
}

/// A relationship fact: `from` --property--> `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipFact {
    pub id: FactId,
    pub property_id: PropertyId,
    pub kind: PropertyKind,
    pub from_entry_id: EntryId,
    pub to_entry_id: EntryId,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub weight: Option<i64>,
}

/// A value fact: the property's value for one entry, stored as a lookup expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFact {
    pub id: FactId,
    pub entry_id: EntryId,
    pub property_id: PropertyId,
    pub value_expression: String,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub slot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFeature {
    pub entry_id: EntryId,
    /// Filled from the entry name by the backend.
    #[serde(default)]
    pub alt_text: String,
    pub image_url: String,
    pub content_type: String,
    pub size: i64,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub blur_hash: Option<String>,
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub entry_id: EntryId,
    pub filename: String,
    pub url: String,
    pub content_type: String,
    pub size: i64,
}

/// One materialised member of an entry set, with the annotations of the last
/// stage that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRow {
    pub id: EntryId,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub weight: Option<i64>,
}

impl EntryRow {
    pub fn new(id: EntryId) -> Self {
        Self {
            id,
            rank: None,
            note: None,
            slot: None,
            weight: None,
        }
    }
}

// ============================================================================
// Transaction trait
// ============================================================================

/// Read-only access to one site's graph for the duration of an evaluation
///
/// Implementations must be side-effect free. Missing ids are skipped rather
/// than reported, so callers compare what came back with what they asked for.
#[async_trait]
pub trait GraphTransaction: Send + Sync {
    /// One window of a composed entry-set query, in set order.
    async fn fetch_entry_set(
        &self,
        query: &EntrySetQuery,
        window: Window,
    ) -> BackendResult<Vec<EntryRow>>;

    async fn count_entry_set(&self, query: &EntrySetQuery) -> BackendResult<u64>;

    /// One window of a row query. Each row is a JSON object.
    async fn fetch_rows(
        &self,
        query: &RowQuery,
        window: Window,
    ) -> BackendResult<Vec<serde_json::Value>>;

    async fn count_rows(&self, query: &RowQuery) -> BackendResult<u64>;

    async fn entries(&self, site: &SiteId, ids: &[EntryId]) -> BackendResult<Vec<EntryRecord>>;

    async fn entries_by_friendly_id(
        &self,
        site: &SiteId,
        friendly_ids: &[String],
    ) -> BackendResult<Vec<EntryRecord>>;

    async fn entry_types(
        &self,
        site: &SiteId,
        ids: &[EntryTypeId],
    ) -> BackendResult<Vec<EntryTypeRecord>>;

    async fn properties(
        &self,
        site: &SiteId,
        ids: &[PropertyId],
    ) -> BackendResult<Vec<PropertyRecord>>;

    /// Relationship facts touching `entries` in the given direction. With
    /// [`Direction::Both`] a fact linking two of the entries is returned once.
    async fn relationships(
        &self,
        site: &SiteId,
        entries: &[EntryId],
        filter: &RelationshipFilter,
        direction: Direction,
    ) -> BackendResult<Vec<RelationshipFact>>;

    /// Value facts of `property` stored directly on `entries`.
    async fn property_facts(
        &self,
        site: &SiteId,
        entries: &[EntryId],
        property: &PropertyId,
    ) -> BackendResult<Vec<PropertyFact>>;

    async fn image_features(
        &self,
        site: &SiteId,
        entries: &[EntryId],
    ) -> BackendResult<Vec<ImageFeature>>;
}
