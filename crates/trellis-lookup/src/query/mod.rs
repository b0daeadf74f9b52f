//! Query-fragment AST for lazy entry sets
//!
//! A lazy entry set is a composable description of "which entries, in which
//! order" that is only sent to the backend when a window or a count is
//! needed. Stages are appended with [`EntrySetQuery::then`], which returns a
//! new query and leaves the original untouched.
//!
//! Every stage yields distinct entries, ordered by the position of the entry
//! that produced them, then rank, then name, then id.

pub mod cypher;

use serde::Serialize;

use crate::backend::Direction;
use crate::ids::{EntryId, PropertyId, SiteId};

/// Where an entry set starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum EntrySetSource {
    /// A fixed, ordered list of entries.
    Entries { ids: Vec<EntryId> },
    /// Every entry on the site, ordered by name.
    AllEntries,
}

/// One step applied to the entries produced so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum EntrySetStage {
    /// Targets of the entries' relationship facts for `property`.
    /// Annotates `rank`, `note`, `slot`.
    FollowProperty { property: PropertyId },
    /// Entries whose facts for `property` point at the current entries.
    /// Annotates `rank`, `note`, `slot`.
    Reverse { property: PropertyId },
    /// One-hop neighbours over relationship facts, optionally of one
    /// property. Annotates `weight`, `note`.
    Related {
        property: Option<PropertyId>,
        direction: Direction,
    },
}

/// A composed, read-only entry-set query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySetQuery {
    site: SiteId,
    source: EntrySetSource,
    stages: Vec<EntrySetStage>,
}

impl EntrySetQuery {
    /// Query over a fixed list of entries. Duplicates keep their first position.
    pub fn from_entries(site: SiteId, ids: impl IntoIterator<Item = EntryId>) -> Self {
        let mut unique: Vec<EntryId> = Vec::new();
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self {
            site,
            source: EntrySetSource::Entries { ids: unique },
            stages: Vec::new(),
        }
    }

    pub fn all_entries(site: SiteId) -> Self {
        Self {
            site,
            source: EntrySetSource::AllEntries,
            stages: Vec::new(),
        }
    }

    /// A new query with `stage` appended.
    #[must_use]
    pub fn then(&self, stage: EntrySetStage) -> Self {
        let mut next = self.clone();
        next.stages.push(stage);
        next
    }

    pub fn site(&self) -> &SiteId {
        &self.site
    }

    pub fn source(&self) -> &EntrySetSource {
        &self.source
    }

    pub fn stages(&self) -> &[EntrySetStage] {
        &self.stages
    }

    /// The member ids when they are known without asking the backend.
    pub fn seeded_ids(&self) -> Option<&[EntryId]> {
        match (&self.source, self.stages.is_empty()) {
            (EntrySetSource::Entries { ids }, true) => Some(ids),
            _ => None,
        }
    }
}

/// A row-producing query for lazy row iterables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rows", rename_all = "camelCase")]
pub enum RowQuery {
    /// Data files attached to the entries, ordered by entry then filename.
    /// Each row is `{entryId, filename, url, contentType, size}`.
    Files { entries: EntrySetQuery },
}

impl RowQuery {
    pub fn site(&self) -> &SiteId {
        match self {
            Self::Files { entries } => entries.site(),
        }
    }
}

/// Pagination window: skip `skip` items then take at most `limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Window {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Window {
    pub fn new(skip: u64, limit: u64) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }

    /// Everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// The first `count` items.
    pub fn first(count: u64) -> Self {
        Self::new(0, count)
    }

    /// Applies the window to an in-memory sequence.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let iter = items.into_iter().skip(skip);
        match self.limit {
            Some(limit) => iter.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
            None => iter.collect(),
        }
    }
}
