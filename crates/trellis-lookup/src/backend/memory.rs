//! In-memory graph backend
//!
//! Answers every [`GraphTransaction`] read from an immutable
//! [`GraphSnapshot`], applying entry-set stages with the same ordering and
//! de-duplication rules as the rendered Cypher. Used by tests, fixtures and
//! the CLI's `--graph` option.
//!
//! ## Thread Safety
//!
//! The snapshot is shared read-only. Call statistics sit behind a
//! `parking_lot::Mutex` so tests can assert how many backend round trips an
//! evaluation made.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{
    BackendError, BackendResult, Direction, EntryRecord, EntryRow, EntryTypeRecord, FileRecord,
    GraphTransaction, ImageFeature, PropertyFact, PropertyKind, PropertyRecord, RelationshipFact,
    RelationshipFilter,
};
use crate::ids::{EntryId, EntryTypeId, PropertyId, SiteId};
use crate::query::{EntrySetQuery, EntrySetSource, EntrySetStage, RowQuery, Window};

// ============================================================================
// Snapshot
// ============================================================================

/// Every site's graph data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    #[serde(default)]
    pub sites: Vec<SiteSnapshot>,
}

impl GraphSnapshot {
    pub fn from_json(json: &str) -> BackendResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn site(&self, id: &SiteId) -> Option<&SiteSnapshot> {
        self.sites.iter().find(|site| &site.id == id)
    }
}

/// One site's entry types, entries, properties and facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSnapshot {
    pub id: SiteId,
    #[serde(default)]
    pub entry_types: Vec<EntryTypeRecord>,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
    #[serde(default)]
    pub properties: Vec<PropertyRecord>,
    #[serde(default)]
    pub relationships: Vec<RelationshipFact>,
    #[serde(default)]
    pub property_facts: Vec<PropertyFact>,
    #[serde(default)]
    pub images: Vec<ImageFeature>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl SiteSnapshot {
    pub fn new(id: impl Into<SiteId>) -> Self {
        Self {
            id: id.into(),
            entry_types: Vec::new(),
            entries: Vec::new(),
            properties: Vec::new(),
            relationships: Vec::new(),
            property_facts: Vec::new(),
            images: Vec::new(),
            files: Vec::new(),
        }
    }

    fn entry(&self, id: &EntryId) -> Option<&EntryRecord> {
        self.entries.iter().find(|entry| &entry.id == id)
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Number of backend calls made, per kind of read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub entry_set_fetches: u64,
    pub entry_set_counts: u64,
    pub row_fetches: u64,
    pub row_counts: u64,
    pub relationship_reads: u64,
    pub property_fact_reads: u64,
    /// Entries, entry types, properties and image features by id.
    pub point_reads: u64,
}

impl MemoryStats {
    pub fn total(&self) -> u64 {
        self.entry_set_fetches
            + self.entry_set_counts
            + self.row_fetches
            + self.row_counts
            + self.relationship_reads
            + self.property_fact_reads
            + self.point_reads
    }
}

// ============================================================================
// Backend
// ============================================================================

/// [`GraphTransaction`] over an in-memory snapshot
#[derive(Debug)]
pub struct MemoryGraph {
    snapshot: Arc<GraphSnapshot>,
    stats: Mutex<MemoryStats>,
}

impl MemoryGraph {
    pub fn new(snapshot: GraphSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            stats: Mutex::new(MemoryStats::default()),
        }
    }

    pub fn from_json(json: &str) -> BackendResult<Self> {
        Ok(Self::new(GraphSnapshot::from_json(json)?))
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn stats(&self) -> MemoryStats {
        *self.stats.lock()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = MemoryStats::default();
    }

    fn record(&self, update: impl FnOnce(&mut MemoryStats)) {
        update(&mut self.stats.lock());
    }

    fn site(&self, id: &SiteId) -> Option<&SiteSnapshot> {
        self.snapshot.site(id)
    }

    fn entry_rows(&self, query: &EntrySetQuery) -> Vec<EntryRow> {
        match self.site(query.site()) {
            Some(site) => evaluate_entry_set(site, query),
            None => Vec::new(),
        }
    }

    fn row_values(&self, query: &RowQuery) -> BackendResult<Vec<serde_json::Value>> {
        match query {
            RowQuery::Files { entries } => {
                let Some(site) = self.site(entries.site()) else {
                    return Ok(Vec::new());
                };
                let mut rows = Vec::new();
                for member in evaluate_entry_set(site, entries) {
                    let mut files: Vec<&FileRecord> = site
                        .files
                        .iter()
                        .filter(|file| file.entry_id == member.id)
                        .collect();
                    files.sort_by(|a, b| a.filename.cmp(&b.filename));
                    for file in files {
                        rows.push(serde_json::to_value(file)?);
                    }
                }
                Ok(rows)
            }
        }
    }
}

#[async_trait]
impl GraphTransaction for MemoryGraph {
    async fn fetch_entry_set(
        &self,
        query: &EntrySetQuery,
        window: Window,
    ) -> BackendResult<Vec<EntryRow>> {
        self.record(|stats| stats.entry_set_fetches += 1);
        Ok(window.apply(self.entry_rows(query)))
    }

    async fn count_entry_set(&self, query: &EntrySetQuery) -> BackendResult<u64> {
        self.record(|stats| stats.entry_set_counts += 1);
        Ok(self.entry_rows(query).len() as u64)
    }

    async fn fetch_rows(
        &self,
        query: &RowQuery,
        window: Window,
    ) -> BackendResult<Vec<serde_json::Value>> {
        self.record(|stats| stats.row_fetches += 1);
        Ok(window.apply(self.row_values(query)?))
    }

    async fn count_rows(&self, query: &RowQuery) -> BackendResult<u64> {
        self.record(|stats| stats.row_counts += 1);
        Ok(self.row_values(query)?.len() as u64)
    }

    async fn entries(&self, site: &SiteId, ids: &[EntryId]) -> BackendResult<Vec<EntryRecord>> {
        self.record(|stats| stats.point_reads += 1);
        Ok(select(self.site(site), |site| &site.entries, |entry| {
            ids.contains(&entry.id)
        }))
    }

    async fn entries_by_friendly_id(
        &self,
        site: &SiteId,
        friendly_ids: &[String],
    ) -> BackendResult<Vec<EntryRecord>> {
        self.record(|stats| stats.point_reads += 1);
        Ok(select(self.site(site), |site| &site.entries, |entry| {
            friendly_ids.contains(&entry.friendly_id)
        }))
    }

    async fn entry_types(
        &self,
        site: &SiteId,
        ids: &[EntryTypeId],
    ) -> BackendResult<Vec<EntryTypeRecord>> {
        self.record(|stats| stats.point_reads += 1);
        Ok(select(self.site(site), |site| &site.entry_types, |entry_type| {
            ids.contains(&entry_type.id)
        }))
    }

    async fn properties(
        &self,
        site: &SiteId,
        ids: &[PropertyId],
    ) -> BackendResult<Vec<PropertyRecord>> {
        self.record(|stats| stats.point_reads += 1);
        Ok(select(self.site(site), |site| &site.properties, |property| {
            ids.contains(&property.id)
        }))
    }

    async fn relationships(
        &self,
        site: &SiteId,
        entries: &[EntryId],
        filter: &RelationshipFilter,
        direction: Direction,
    ) -> BackendResult<Vec<RelationshipFact>> {
        self.record(|stats| stats.relationship_reads += 1);
        let Some(site) = self.site(site) else {
            return Ok(Vec::new());
        };
        let wanted: HashSet<&EntryId> = entries.iter().collect();
        let mut facts: Vec<RelationshipFact> = site
            .relationships
            .iter()
            .filter(|fact| match direction {
                Direction::Outgoing => wanted.contains(&fact.from_entry_id),
                Direction::Incoming => wanted.contains(&fact.to_entry_id),
                Direction::Both => {
                    wanted.contains(&fact.from_entry_id) || wanted.contains(&fact.to_entry_id)
                }
            })
            .filter(|fact| match filter {
                RelationshipFilter::IsA => fact.kind == PropertyKind::IsA,
                RelationshipFilter::Property(property) => &fact.property_id == property,
                RelationshipFilter::Any => true,
            })
            .cloned()
            .collect();
        facts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(facts)
    }

    async fn property_facts(
        &self,
        site: &SiteId,
        entries: &[EntryId],
        property: &PropertyId,
    ) -> BackendResult<Vec<PropertyFact>> {
        self.record(|stats| stats.property_fact_reads += 1);
        let mut facts = select(self.site(site), |site| &site.property_facts, |fact| {
            &fact.property_id == property && entries.contains(&fact.entry_id)
        });
        facts.sort_by(|a, b| {
            (&a.entry_id, a.rank.unwrap_or(i64::MAX), &a.id).cmp(&(
                &b.entry_id,
                b.rank.unwrap_or(i64::MAX),
                &b.id,
            ))
        });
        Ok(facts)
    }

    async fn image_features(
        &self,
        site: &SiteId,
        entries: &[EntryId],
    ) -> BackendResult<Vec<ImageFeature>> {
        self.record(|stats| stats.point_reads += 1);
        let Some(site) = self.site(site) else {
            return Ok(Vec::new());
        };
        site.images
            .iter()
            .filter(|image| entries.contains(&image.entry_id))
            .map(|image| {
                let entry = site.entry(&image.entry_id).ok_or_else(|| {
                    BackendError::NotFound(format!("entry {} of image", image.entry_id))
                })?;
                Ok(ImageFeature {
                    alt_text: entry.name.clone(),
                    ..image.clone()
                })
            })
            .collect()
    }
}

fn select<T: Clone>(
    site: Option<&SiteSnapshot>,
    records: impl Fn(&SiteSnapshot) -> &Vec<T>,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    match site {
        Some(site) => records(site).iter().filter(|record| keep(record)).cloned().collect(),
        None => Vec::new(),
    }
}

// ============================================================================
// Entry-set evaluation
// ============================================================================

fn evaluate_entry_set(site: &SiteSnapshot, query: &EntrySetQuery) -> Vec<EntryRow> {
    let mut rows: Vec<EntryRow> = match query.source() {
        EntrySetSource::Entries { ids } => ids
            .iter()
            .filter(|id| site.entry(id).is_some())
            .map(|id| EntryRow::new(id.clone()))
            .collect(),
        EntrySetSource::AllEntries => {
            let mut entries: Vec<&EntryRecord> = site.entries.iter().collect();
            entries.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
            entries
                .into_iter()
                .map(|entry| EntryRow::new(entry.id.clone()))
                .collect()
        }
    };
    for stage in query.stages() {
        rows = apply_stage(site, &rows, stage);
    }
    rows
}

/// A stage result before ordering: which member produced it, over which fact.
struct Candidate<'a> {
    ord: usize,
    dir: u8,
    fact: &'a RelationshipFact,
    entry: &'a EntryRecord,
    row: EntryRow,
}

fn apply_stage(site: &SiteSnapshot, rows: &[EntryRow], stage: &EntrySetStage) -> Vec<EntryRow> {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    for (ord, member) in rows.iter().enumerate() {
        for fact in &site.relationships {
            let matched = match stage {
                EntrySetStage::FollowProperty { property } => {
                    (&fact.property_id == property && fact.from_entry_id == member.id)
                        .then_some((0, &fact.to_entry_id))
                        .into_iter()
                        .collect::<Vec<_>>()
                }
                EntrySetStage::Reverse { property } => {
                    (&fact.property_id == property && fact.to_entry_id == member.id)
                        .then_some((0, &fact.from_entry_id))
                        .into_iter()
                        .collect()
                }
                EntrySetStage::Related {
                    property,
                    direction,
                } => {
                    if property.as_ref().is_some_and(|property| &fact.property_id != property) {
                        continue;
                    }
                    let mut found = Vec::new();
                    if *direction != Direction::Incoming && fact.from_entry_id == member.id {
                        found.push((0, &fact.to_entry_id));
                    }
                    if *direction != Direction::Outgoing && fact.to_entry_id == member.id {
                        found.push((1, &fact.from_entry_id));
                    }
                    found
                }
            };
            for (dir, target) in matched {
                let Some(entry) = site.entry(target) else {
                    continue;
                };
                let row = match stage {
                    EntrySetStage::Related { .. } => EntryRow {
                        note: fact.note.clone(),
                        weight: fact.weight,
                        ..EntryRow::new(entry.id.clone())
                    },
                    _ => EntryRow {
                        rank: fact.rank,
                        note: fact.note.clone(),
                        slot: fact.slot.clone(),
                        ..EntryRow::new(entry.id.clone())
                    },
                };
                candidates.push(Candidate {
                    ord,
                    dir,
                    fact,
                    entry,
                    row,
                });
            }
        }
    }

    candidates.sort_by(|a, b| {
        let key = |c: &Candidate<'_>| {
            (
                c.ord,
                c.dir,
                c.fact.rank.unwrap_or(i64::MAX),
                c.entry.name.clone(),
                c.entry.id.clone(),
                c.fact.id.clone(),
            )
        };
        key(a).cmp(&key(b))
    });

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.entry.id.clone()))
        .map(|candidate| candidate.row)
        .collect()
}
