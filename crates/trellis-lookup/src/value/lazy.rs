//! Lazy sequences
//!
//! Each lazy value exposes a count and a windowed fetch. Fetching a window
//! of an entry set or a row query is exactly one backend call carrying the
//! composed query plus the window; counting is one more.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::{row_annotations, Annotations, LookupValue};
use crate::context::EvalContext;
use crate::error::LookupResult;
use crate::expr::LookupExpression;
use crate::ids::{EntryId, SiteId};
use crate::query::{EntrySetQuery, EntrySetStage, RowQuery, Window};

// ============================================================================
// Entry sets
// ============================================================================

/// A deferred, ordered set of distinct entries
#[derive(Debug, Clone, PartialEq)]
pub struct LazyEntrySet {
    query: EntrySetQuery,
    /// Annotations of seeded members, used while the query has no stages.
    seed_annotations: BTreeMap<EntryId, Annotations>,
    /// Evaluated per materialised member with `$entry` bound to it and
    /// attached as the `detail` annotation.
    detail: Option<Box<LookupExpression>>,
}

impl LazyEntrySet {
    pub fn new(query: EntrySetQuery) -> Self {
        Self {
            query,
            seed_annotations: BTreeMap::new(),
            detail: None,
        }
    }

    /// A set of known entries, each with its own annotations. Later
    /// duplicates are ignored.
    pub fn from_entries(
        site: SiteId,
        members: impl IntoIterator<Item = (EntryId, Annotations)>,
    ) -> Self {
        let mut ids = Vec::new();
        let mut seed_annotations = BTreeMap::new();
        for (id, annotations) in members {
            if !seed_annotations.contains_key(&id) {
                ids.push(id.clone());
                seed_annotations.insert(id, annotations);
            }
        }
        Self {
            query: EntrySetQuery::from_entries(site, ids),
            seed_annotations,
            detail: None,
        }
    }

    pub fn query(&self) -> &EntrySetQuery {
        &self.query
    }

    pub fn detail(&self) -> Option<&LookupExpression> {
        self.detail.as_deref()
    }

    /// A new set with `stage` applied to this one's members.
    #[must_use]
    pub fn then(&self, stage: EntrySetStage) -> Self {
        Self::new(self.query.then(stage))
    }

    #[must_use]
    pub fn with_detail(mut self, template: LookupExpression) -> Self {
        self.detail = Some(Box::new(template));
        self
    }

    pub async fn count(&self, ctx: &EvalContext) -> LookupResult<u64> {
        debug!(
            site = %self.query.site(),
            stages = self.query.stages().len(),
            "counting lazy entry set"
        );
        Ok(ctx.transaction().count_entry_set(&self.query).await?)
    }

    pub async fn fetch(&self, ctx: &EvalContext, window: Window) -> LookupResult<Vec<LookupValue>> {
        debug!(
            site = %self.query.site(),
            skip = window.skip,
            limit = ?window.limit,
            "fetching lazy entry set window"
        );
        let rows = ctx.transaction().fetch_entry_set(&self.query, window).await?;
        let seeded = self.query.stages().is_empty();

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let annotations = if seeded {
                self.seed_annotations
                    .get(&row.id)
                    .cloned()
                    .unwrap_or_default()
            } else {
                row_annotations(&row)
            };
            let mut value = LookupValue::Entry(row.id.clone()).annotate(annotations);
            if let Some(template) = &self.detail {
                let detail = evaluate_detail(ctx, template, &row.id).await?;
                value = value.annotate(Annotations::from([("detail".to_string(), detail)]));
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Every member id, in order. Seeded sets answer without the backend.
    pub async fn entry_ids(&self, ctx: &EvalContext) -> LookupResult<Vec<EntryId>> {
        if let Some(ids) = self.query.seeded_ids() {
            return Ok(ids.to_vec());
        }
        let rows = ctx
            .transaction()
            .fetch_entry_set(&self.query, Window::all())
            .await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }
}

/// Evaluates a detail template for one entry and makes the result concrete.
pub(crate) async fn evaluate_detail(
    ctx: &EvalContext,
    template: &LookupExpression,
    entry: &EntryId,
) -> LookupResult<LookupValue> {
    let bound = template.substitute("entry", &LookupExpression::resolved_entry(entry.clone()));
    let value = bound.get_value(ctx).await?;
    value.make_concrete(ctx, ctx.default_page_size()).await
}

// ============================================================================
// Lists
// ============================================================================

/// A fixed list of already-evaluated values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LazyList {
    items: Vec<LookupValue>,
}

impl LazyList {
    pub fn new(items: Vec<LookupValue>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[LookupValue] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn fetch(&self, window: Window) -> Vec<LookupValue> {
        window.apply(self.items.iter().cloned())
    }
}

// ============================================================================
// Row-backed iterables
// ============================================================================

/// Turns one backend row into a value
pub type RowMapper = fn(&serde_json::Value) -> LookupResult<LookupValue>;

/// A deferred row query with a row-to-value mapper
#[derive(Clone)]
pub struct LazyRows {
    query: RowQuery,
    mapper: RowMapper,
}

impl LazyRows {
    pub fn new(query: RowQuery, mapper: RowMapper) -> Self {
        Self { query, mapper }
    }

    pub fn query(&self) -> &RowQuery {
        &self.query
    }

    pub async fn count(&self, ctx: &EvalContext) -> LookupResult<u64> {
        debug!(site = %self.query.site(), "counting lazy rows");
        Ok(ctx.transaction().count_rows(&self.query).await?)
    }

    pub async fn fetch(&self, ctx: &EvalContext, window: Window) -> LookupResult<Vec<LookupValue>> {
        debug!(
            site = %self.query.site(),
            skip = window.skip,
            limit = ?window.limit,
            "fetching lazy rows window"
        );
        let rows = ctx.transaction().fetch_rows(&self.query, window).await?;
        rows.iter().map(self.mapper).collect()
    }
}

impl fmt::Debug for LazyRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRows")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Two row iterables are equal when they run the same query.
impl PartialEq for LazyRows {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query
    }
}
