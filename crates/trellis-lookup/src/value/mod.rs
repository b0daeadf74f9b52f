//! Lookup Values
//!
//! The closed set of runtime values an expression can produce.
//!
//! ## Families
//!
//! - **Concrete** values are plain data and serialize directly with
//!   [`LookupValue::to_json`].
//! - **Lazy** values ([`LazyEntrySet`], [`LazyList`], [`LazyRows`]) describe a
//!   sequence that has not been read yet. They expose a count and a windowed
//!   fetch, and become a [`PageValue`] through [`LookupValue::make_concrete`].
//!
//! Any value may carry annotations (`distance`, `rank`, `note`, ...). An
//! annotated value is stored as `Annotated(base, annotations)` where the base
//! is never itself annotated and the map is never empty.

mod json;
mod lazy;

pub use json::{AnyValueJson, GraphEntryJson, GraphRelJson, PageSourceJson, ValueJson};
pub use lazy::{LazyEntrySet, LazyList, LazyRows, RowMapper};
pub(crate) use lazy::evaluate_detail;

use chrono::NaiveDate;
use futures::future::BoxFuture;
use num_bigint::{BigInt, Sign};
use std::collections::BTreeMap;
use std::fmt;

use crate::backend::EntryRow;
use crate::context::EvalContext;
use crate::error::{LookupError, LookupResult};
use crate::expr::LookupExpression;
use crate::ids::{EntryId, EntryTypeId, FactId, PropertyId};
use crate::query::Window;

/// Annotation map attached to a value
pub type Annotations = BTreeMap<String, LookupValue>;

/// Every kind of value, used for casting and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    String,
    Date,
    Entry,
    EntryType,
    Property,
    File,
    Image,
    InlineMarkdown,
    Page,
    Graph,
    Error,
    EntrySet,
    List,
    Rows,
}

impl ValueKind {
    pub fn is_lazy(self) -> bool {
        matches!(self, Self::EntrySet | Self::List | Self::Rows)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum LookupValue {
    Null,
    Boolean(bool),
    Integer(BigInt),
    String(String),
    Date(NaiveDate),
    Entry(EntryId),
    EntryType(EntryTypeId),
    Property(PropertyId),
    File(FileValue),
    Image(Box<ImageValue>),
    InlineMarkdown(String),
    Page(PageValue),
    Graph(GraphValue),
    Error(ErrorValue),
    Annotated(Box<LookupValue>, Annotations),
    LazyEntrySet(LazyEntrySet),
    LazyList(LazyList),
    LazyRows(LazyRows),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValue {
    pub filename: String,
    pub url: String,
    pub content_type: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageValue {
    pub entry_id: EntryId,
    pub alt_text: String,
    pub image_url: String,
    pub content_type: String,
    pub size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub blur_hash: Option<String>,
    pub border_color: Option<String>,
    /// Inline markdown.
    pub caption: Option<String>,
}

/// A materialised window over a larger ordered sequence
///
/// Invariant: `started_at <= total_count`, `values.len() <= page_size` and
/// `started_at + values.len() <= total_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageValue {
    pub values: Vec<LookupValue>,
    pub started_at: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub source: Option<PageSource>,
}

impl PageValue {
    pub fn new(values: Vec<LookupValue>, started_at: u64, page_size: u64, total_count: u64) -> Self {
        Self {
            values,
            started_at,
            page_size,
            total_count,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, expression: LookupExpression, entry_id: Option<EntryId>) -> Self {
        self.source = Some(PageSource {
            expression: Box::new(expression),
            entry_id,
        });
        self
    }

    /// True if the page holds every value of the sequence.
    pub fn is_complete(&self) -> bool {
        self.started_at == 0 && self.values.len() as u64 == self.total_count
    }
}

/// The lazy expression a page was produced from, and the entry it was
/// evaluated for
#[derive(Debug, Clone, PartialEq)]
pub struct PageSource {
    pub expression: Box<LookupExpression>,
    pub entry_id: Option<EntryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphValue {
    pub entries: Vec<GraphEntry>,
    pub rels: Vec<GraphRel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEntry {
    pub entry_id: EntryId,
    pub name: String,
    pub entry_type_id: EntryTypeId,
    pub is_focus_entry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRel {
    pub rel_id: FactId,
    pub rel_type_id: PropertyId,
    pub from_entry_id: EntryId,
    pub to_entry_id: EntryId,
}

/// A serialisable error, used where one failing lookup must not abort others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub error_class: String,
    pub message: String,
}

impl From<&LookupError> for ErrorValue {
    fn from(err: &LookupError) -> Self {
        Self {
            error_class: err.class().to_string(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Construction and annotations
// ============================================================================

impl LookupValue {
    pub fn integer(value: impl Into<BigInt>) -> Self {
        Self::Integer(value.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn entry(id: impl Into<EntryId>) -> Self {
        Self::Entry(id.into())
    }

    pub fn from_error(err: &LookupError) -> Self {
        Self::Error(err.into())
    }

    /// Attaches annotations, merging with any already present.
    #[must_use]
    pub fn annotate(self, annotations: Annotations) -> Self {
        if annotations.is_empty() {
            return self;
        }
        match self {
            Self::Annotated(base, mut existing) => {
                existing.extend(annotations);
                Self::Annotated(base, existing)
            }
            base => Self::Annotated(Box::new(base), annotations),
        }
    }

    /// The value without its annotations.
    pub fn unannotated(&self) -> &LookupValue {
        match self {
            Self::Annotated(base, _) => base,
            other => other,
        }
    }

    pub fn annotations(&self) -> Option<&Annotations> {
        match self {
            Self::Annotated(_, annotations) => Some(annotations),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (LookupValue, Annotations) {
        match self {
            Self::Annotated(base, annotations) => (*base, annotations),
            other => (other, Annotations::new()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::String(_) => ValueKind::String,
            Self::Date(_) => ValueKind::Date,
            Self::Entry(_) => ValueKind::Entry,
            Self::EntryType(_) => ValueKind::EntryType,
            Self::Property(_) => ValueKind::Property,
            Self::File(_) => ValueKind::File,
            Self::Image(_) => ValueKind::Image,
            Self::InlineMarkdown(_) => ValueKind::InlineMarkdown,
            Self::Page(_) => ValueKind::Page,
            Self::Graph(_) => ValueKind::Graph,
            Self::Error(_) => ValueKind::Error,
            Self::Annotated(base, _) => base.kind(),
            Self::LazyEntrySet(_) => ValueKind::EntrySet,
            Self::LazyList(_) => ValueKind::List,
            Self::LazyRows(_) => ValueKind::Rows,
        }
    }

    pub fn is_lazy(&self) -> bool {
        self.kind().is_lazy()
    }

    /// The entry id if this is a single (possibly annotated) entry.
    pub fn as_entry(&self) -> Option<&EntryId> {
        match self.unannotated() {
            Self::Entry(id) => Some(id),
            _ => None,
        }
    }
}

/// Relationship metadata as annotations; absent fields are omitted.
pub(crate) fn fact_annotations(
    rank: Option<i64>,
    note: Option<&str>,
    slot: Option<&str>,
    weight: Option<i64>,
) -> Annotations {
    let mut annotations = Annotations::new();
    if let Some(rank) = rank {
        annotations.insert("rank".to_string(), LookupValue::integer(rank));
    }
    if let Some(note) = note {
        annotations.insert(
            "note".to_string(),
            LookupValue::InlineMarkdown(note.to_string()),
        );
    }
    if let Some(slot) = slot {
        annotations.insert("slot".to_string(), LookupValue::string(slot));
    }
    if let Some(weight) = weight {
        annotations.insert("weight".to_string(), LookupValue::integer(weight));
    }
    annotations
}

pub(crate) fn row_annotations(row: &EntryRow) -> Annotations {
    fact_annotations(row.rank, row.note.as_deref(), row.slot.as_deref(), row.weight)
}

// ============================================================================
// Casting
// ============================================================================

impl LookupValue {
    /// Converts to `kind`, or `None` if no conversion exists.
    ///
    /// Annotated values convert their base; annotations are kept for scalar
    /// targets and become per-member annotations when the target is a set.
    pub fn cast_to(&self, kind: ValueKind, ctx: &EvalContext) -> Option<LookupValue> {
        if self.kind() == kind {
            return Some(self.clone());
        }
        let (base, annotations) = match self {
            Self::Annotated(base, annotations) => (base.as_ref(), annotations.clone()),
            other => (other, Annotations::new()),
        };
        match (base, kind) {
            (Self::Entry(id), ValueKind::EntrySet) => Some(Self::LazyEntrySet(
                LazyEntrySet::from_entries(ctx.site_id().clone(), [(id.clone(), annotations)]),
            )),
            (Self::Page(page), ValueKind::EntrySet) => entries_as_set(&page.values, ctx),
            (Self::LazyList(list), ValueKind::EntrySet) => entries_as_set(list.items(), ctx),
            (Self::String(text), ValueKind::InlineMarkdown) => {
                Some(Self::InlineMarkdown(text.clone()).annotate(annotations))
            }
            _ => None,
        }
    }
}

fn entries_as_set(values: &[LookupValue], ctx: &EvalContext) -> Option<LookupValue> {
    let members = values
        .iter()
        .map(|value| {
            let (base, annotations) = value.clone().into_parts();
            match base {
                LookupValue::Entry(id) => Some((id, annotations)),
                _ => None,
            }
        })
        .collect::<Option<Vec<_>>>()?;
    Some(LookupValue::LazyEntrySet(LazyEntrySet::from_entries(
        ctx.site_id().clone(),
        members,
    )))
}

// ============================================================================
// Capabilities
// ============================================================================

impl LookupValue {
    pub fn is_iterable(&self) -> bool {
        matches!(
            self.unannotated(),
            Self::Page(_) | Self::LazyEntrySet(_) | Self::LazyList(_) | Self::LazyRows(_)
        )
    }

    pub fn is_countable(&self) -> bool {
        self.is_iterable()
    }

    /// Total size, or `None` if the value cannot be counted.
    ///
    /// Lists are counted structurally; their items are never evaluated.
    pub async fn count(&self, ctx: &EvalContext) -> LookupResult<Option<u64>> {
        Ok(match self.unannotated() {
            Self::Page(page) => Some(page.total_count),
            Self::LazyEntrySet(set) => Some(set.count(ctx).await?),
            Self::LazyList(list) => Some(list.len() as u64),
            Self::LazyRows(rows) => Some(rows.count(ctx).await?),
            _ => None,
        })
    }

    /// One window of the sequence, or `None` if the value is not iterable.
    pub async fn fetch(
        &self,
        ctx: &EvalContext,
        window: Window,
    ) -> LookupResult<Option<Vec<LookupValue>>> {
        Ok(match self.unannotated() {
            Self::Page(page) => Some(window.apply(page.values.iter().cloned())),
            Self::LazyEntrySet(set) => Some(set.fetch(ctx, window).await?),
            Self::LazyList(list) => Some(list.fetch(window)),
            Self::LazyRows(rows) => Some(rows.fetch(ctx, window).await?),
            _ => None,
        })
    }

    /// false, 0, "", Null and empty sequences are falsy.
    pub async fn is_truthy(&self, ctx: &EvalContext) -> LookupResult<bool> {
        Ok(match self.unannotated() {
            Self::Null => false,
            Self::Boolean(value) => *value,
            Self::Integer(value) => value.sign() != Sign::NoSign,
            Self::String(text) | Self::InlineMarkdown(text) => !text.is_empty(),
            Self::Page(page) => page.total_count > 0,
            Self::LazyEntrySet(set) => set.count(ctx).await? > 0,
            Self::LazyList(list) => !list.is_empty(),
            Self::LazyRows(rows) => rows.count(ctx).await? > 0,
            _ => true,
        })
    }

    /// Forces lazy values (including nested items and annotation values)
    /// into concrete ones. Sequences become a page of the first `page_size`
    /// items.
    pub fn make_concrete<'a>(
        &'a self,
        ctx: &'a EvalContext,
        page_size: u64,
    ) -> BoxFuture<'a, LookupResult<LookupValue>> {
        Box::pin(async move {
            match self {
                Self::Annotated(base, annotations) => {
                    let base = base.make_concrete(ctx, page_size).await?;
                    let mut concrete = Annotations::new();
                    for (name, value) in annotations {
                        concrete.insert(name.clone(), value.make_concrete(ctx, page_size).await?);
                    }
                    Ok(base.annotate(concrete))
                }
                Self::LazyEntrySet(set) => {
                    let total = set.count(ctx).await?;
                    let values = set.fetch(ctx, Window::first(page_size)).await?;
                    concrete_page(ctx, values, total, page_size).await
                }
                Self::LazyList(list) => {
                    let values = list.fetch(Window::first(page_size));
                    concrete_page(ctx, values, list.len() as u64, page_size).await
                }
                Self::LazyRows(rows) => {
                    let total = rows.count(ctx).await?;
                    let values = rows.fetch(ctx, Window::first(page_size)).await?;
                    concrete_page(ctx, values, total, page_size).await
                }
                Self::Page(page) => {
                    let mut values = Vec::with_capacity(page.values.len());
                    for value in &page.values {
                        values.push(value.make_concrete(ctx, page_size).await?);
                    }
                    Ok(Self::Page(PageValue {
                        values,
                        ..page.clone()
                    }))
                }
                other => Ok(other.clone()),
            }
        })
    }
}

async fn concrete_page(
    ctx: &EvalContext,
    values: Vec<LookupValue>,
    total_count: u64,
    page_size: u64,
) -> LookupResult<LookupValue> {
    let mut concrete = Vec::with_capacity(values.len());
    for value in &values {
        concrete.push(value.make_concrete(ctx, page_size).await?);
    }
    Ok(LookupValue::Page(PageValue::new(
        concrete,
        0,
        page_size,
        total_count,
    )))
}
