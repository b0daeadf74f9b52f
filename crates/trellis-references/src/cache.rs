//! Reference accumulation
//!
//! A [`ReferenceCache`] collects every entry, entry type and property that
//! a rendered value points at, directly or through markdown and embedded
//! lookups, then loads them in one pass with [`ReferenceCache::get_data`].
//!
//! Embedded lookups can reveal more entries, whose descriptions can hold
//! more lookups, so `get_data` repeats until nothing new turns up or the
//! round limit is reached. A `(context, expression)` pair is evaluated at
//! most once.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use tracing::{debug, warn};
use trellis_lookup::backend::EntryRecord;
use trellis_lookup::ids::{is_entry_id, is_friendly_id};
use trellis_lookup::{
    parse_lookup, AnyValueJson, EntryId, EntryTypeId, EvalContext, LookupError,
    LookupExpression, PropertyId, ValueJson,
};

use crate::data::{LookupRecord, ReferenceData};
use crate::error::{ReferenceError, ReferenceResult};
use crate::markdown::scan_markdown;

/// Error class reported for embedded lookups that do not parse.
pub const PARSE_ERROR_CLASS: &str = "LookupParseError";

/// Every `type` tag the value walk understands.
const KNOWN_KINDS: &[&str] = &[
    "Null",
    "Boolean",
    "Integer",
    "String",
    "Date",
    "Entry",
    "EntryType",
    "Property",
    "File",
    "Image",
    "InlineMarkdownString",
    "Page",
    "Graph",
    "Error",
];

/// Bounds on embedded lookup evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    /// Page size used when making embedded lookup results concrete.
    pub lookup_page_size: u64,
    /// Maximum number of evaluate/resolve/fetch rounds.
    pub max_rounds: u32,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            lookup_page_size: 10,
            max_rounds: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PendingLookup {
    entry_context: Option<EntryId>,
    expression: String,
}

/// Accumulates references and resolves them against a graph
#[derive(Debug, Default)]
pub struct ReferenceCache {
    limits: ExtractionLimits,
    entry_ids: BTreeSet<EntryId>,
    friendly_ids: BTreeSet<String>,
    entry_type_ids: BTreeSet<EntryTypeId>,
    property_ids: BTreeSet<PropertyId>,
    pending: VecDeque<PendingLookup>,
    queued: HashSet<PendingLookup>,
    lookups: Vec<LookupRecord>,
    entries: BTreeMap<EntryId, EntryRecord>,
    /// Ids the backend did not return; never fetched again.
    missing: HashSet<EntryId>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ExtractionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> ExtractionLimits {
        self.limits
    }

    pub fn entry_ids(&self) -> &BTreeSet<EntryId> {
        &self.entry_ids
    }

    pub fn entry_type_ids(&self) -> &BTreeSet<EntryTypeId> {
        &self.entry_type_ids
    }

    pub fn property_ids(&self) -> &BTreeSet<PropertyId> {
        &self.property_ids
    }

    /// Number of lookups queued but not yet evaluated.
    pub fn pending_lookups(&self) -> usize {
        self.pending.len()
    }

    pub fn add_entry(&mut self, id: EntryId) {
        self.entry_ids.insert(id);
    }

    pub fn add_entry_type(&mut self, id: EntryTypeId) {
        self.entry_type_ids.insert(id);
    }

    pub fn add_property(&mut self, id: PropertyId) {
        self.property_ids.insert(id);
    }

    /// An `[[/entry/...]]` or `/entry/...` key: an id or a friendly id.
    pub fn add_entry_key(&mut self, key: &str) {
        if is_entry_id(key) {
            self.add_entry(EntryId::new(key));
        } else if is_friendly_id(key) {
            self.friendly_ids.insert(key.to_string());
        }
    }

    /// Queues an embedded lookup for evaluation and records the literal
    /// references in its text. Returns false if the same lookup was already
    /// queued for the same context.
    pub fn add_lookup(&mut self, expression: &str, entry_context: Option<&EntryId>) -> bool {
        let lookup = PendingLookup {
            entry_context: entry_context.cloned(),
            expression: expression.trim().to_string(),
        };
        if !self.queued.insert(lookup.clone()) {
            return false;
        }
        if let Ok(parsed) = parse_lookup(&lookup.expression) {
            self.scan_expression(&parsed);
        }
        self.pending.push_back(lookup);
        true
    }

    /// Records entry, entry type and property references written literally
    /// in `expr`.
    pub fn scan_expression(&mut self, expr: &LookupExpression) {
        expr.traverse_tree(&mut |node| match node {
            LookupExpression::EntryRef(key) => self.add_entry_key(key),
            LookupExpression::PropertyRef(id) => self.add_property(id.clone()),
            LookupExpression::EntryTypeRef(id) => self.add_entry_type(id.clone()),
            _ => {}
        });
    }

    /// Records the links in `markdown` and queues its embedded lookups.
    pub fn extract_markdown_references(&mut self, markdown: &str, entry_context: Option<&EntryId>) {
        let found = scan_markdown(markdown);
        for id in found.entry_ids {
            self.add_entry(id);
        }
        for key in found.friendly_ids {
            self.friendly_ids.insert(key);
        }
        for id in found.property_ids {
            self.add_property(id);
        }
        for expression in &found.lookups {
            self.add_lookup(expression, entry_context);
        }
    }

    // ========================================================================
    // Value walk
    // ========================================================================

    /// Records everything a serialized value refers to, including inside
    /// annotations, captions and inline markdown.
    pub fn extract_lookup_references(&mut self, value: &AnyValueJson, entry_context: Option<&EntryId>) {
        match &value.value {
            ValueJson::Null
            | ValueJson::Boolean { .. }
            | ValueJson::Integer { .. }
            | ValueJson::String { .. }
            | ValueJson::Date { .. }
            | ValueJson::File { .. }
            | ValueJson::Error { .. } => {}
            ValueJson::Entry { id } => self.add_entry(id.clone()),
            ValueJson::EntryType { id } => self.add_entry_type(id.clone()),
            ValueJson::Property { id } => self.add_property(id.clone()),
            ValueJson::Image {
                entry_id, caption, ..
            } => {
                self.add_entry(entry_id.clone());
                if let Some(caption) = caption {
                    self.extract_markdown_references(caption, entry_context);
                }
            }
            ValueJson::InlineMarkdownString { value } => {
                self.extract_markdown_references(value, entry_context);
            }
            ValueJson::Page { values, source, .. } => {
                let source_entry = source.as_ref().and_then(|source| source.entry_id.as_ref());
                if let Some(entry_id) = source_entry {
                    self.add_entry(entry_id.clone());
                }
                let item_context = source_entry.or(entry_context);
                for item in values {
                    self.extract_lookup_references(item, item_context);
                }
            }
            ValueJson::Graph { entries, rels } => {
                for entry in entries {
                    self.add_entry(entry.entry_id.clone());
                    self.add_entry_type(entry.entry_type_id.clone());
                }
                for rel in rels {
                    self.add_property(rel.rel_type_id.clone());
                }
            }
        }
        for annotation in value.annotations.values() {
            self.extract_lookup_references(annotation, entry_context);
        }
    }

    /// Like [`Self::extract_lookup_references`] for untyped JSON. Fails on
    /// any `type` tag the walk does not know, at any depth.
    pub fn extract_lookup_references_json(
        &mut self,
        value: &serde_json::Value,
        entry_context: Option<&EntryId>,
    ) -> ReferenceResult<()> {
        check_kinds(value)?;
        let typed: AnyValueJson = serde_json::from_value(value.clone())?;
        self.extract_lookup_references(&typed, entry_context);
        Ok(())
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Evaluates queued lookups, resolves friendly ids and loads every
    /// referenced entry, entry type and property.
    ///
    /// A failing lookup is recorded as an `Error` value and does not stop
    /// the others. Backend failures while loading records are returned.
    pub async fn get_data(&mut self, ctx: &EvalContext) -> ReferenceResult<ReferenceData> {
        let mut rounds = 0;
        while self.has_pending_work() {
            if rounds == self.limits.max_rounds {
                warn!(
                    max_rounds = self.limits.max_rounds,
                    pending_lookups = self.pending.len(),
                    "reference extraction stopped before reaching a fixed point"
                );
                break;
            }
            rounds += 1;
            self.evaluate_pending(ctx).await;
            self.resolve_friendly_ids(ctx).await?;
            self.fetch_new_entries(ctx).await?;
        }
        debug!(
            rounds,
            entries = self.entries.len(),
            lookups = self.lookups.len(),
            "reference extraction finished"
        );
        self.build_data(ctx).await
    }

    fn has_pending_work(&self) -> bool {
        !self.pending.is_empty() || !self.friendly_ids.is_empty() || !self.unfetched().is_empty()
    }

    fn unfetched(&self) -> Vec<EntryId> {
        self.entry_ids
            .iter()
            .filter(|id| !self.entries.contains_key(*id) && !self.missing.contains(*id))
            .cloned()
            .collect()
    }

    async fn evaluate_pending(&mut self, ctx: &EvalContext) {
        let pending: Vec<PendingLookup> = self.pending.drain(..).collect();
        for lookup in pending {
            let lookup_ctx = match &lookup.entry_context {
                Some(entry_id) => ctx.clone().with_entry(entry_id.clone()),
                None => ctx.clone(),
            }
            .with_default_page_size(self.limits.lookup_page_size);

            let value = match evaluate(&lookup_ctx, &lookup.expression).await {
                Ok(value) => value,
                Err((error_class, message)) => {
                    warn!(
                        expression = %lookup.expression,
                        entry = ?lookup.entry_context,
                        error_class,
                        "embedded lookup failed: {message}"
                    );
                    AnyValueJson::new(ValueJson::Error {
                        error_class: error_class.to_string(),
                        message,
                    })
                }
            };
            self.extract_lookup_references(&value, lookup.entry_context.as_ref());
            self.lookups.push(LookupRecord {
                entry_context: lookup.entry_context,
                lookup_expression: lookup.expression,
                value,
            });
        }
    }

    async fn resolve_friendly_ids(&mut self, ctx: &EvalContext) -> ReferenceResult<()> {
        if self.friendly_ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = std::mem::take(&mut self.friendly_ids).into_iter().collect();
        let records = ctx
            .transaction()
            .entries_by_friendly_id(ctx.site_id(), &keys)
            .await
            .map_err(LookupError::from)?;
        if records.len() < keys.len() {
            debug!(
                requested = keys.len(),
                resolved = records.len(),
                "some friendly ids did not resolve"
            );
        }
        for record in records {
            self.accept_entry(record);
        }
        Ok(())
    }

    async fn fetch_new_entries(&mut self, ctx: &EvalContext) -> ReferenceResult<()> {
        let ids = self.unfetched();
        if ids.is_empty() {
            return Ok(());
        }
        let records = ctx
            .transaction()
            .entries(ctx.site_id(), &ids)
            .await
            .map_err(LookupError::from)?;
        for record in records {
            self.accept_entry(record);
        }
        for id in ids {
            if !self.entries.contains_key(&id) {
                debug!(entry = %id, "referenced entry does not exist");
                self.missing.insert(id);
            }
        }
        Ok(())
    }

    /// Stores a loaded entry and scans its description.
    fn accept_entry(&mut self, record: EntryRecord) {
        if self.entries.contains_key(&record.id) {
            return;
        }
        self.entry_ids.insert(record.id.clone());
        self.add_entry_type(record.entry_type.clone());
        let description = record.description.clone();
        let id = record.id.clone();
        self.entries.insert(id.clone(), record);
        self.extract_markdown_references(&description, Some(&id));
    }

    async fn build_data(&self, ctx: &EvalContext) -> ReferenceResult<ReferenceData> {
        let mut data = ReferenceData {
            entries: self.entries.clone(),
            lookups: self.lookups.clone(),
            ..ReferenceData::default()
        };

        if !self.entry_type_ids.is_empty() {
            let ids: Vec<EntryTypeId> = self.entry_type_ids.iter().cloned().collect();
            let records = ctx
                .transaction()
                .entry_types(ctx.site_id(), &ids)
                .await
                .map_err(LookupError::from)?;
            data.entry_types = records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect();
        }

        if !self.property_ids.is_empty() {
            let ids: Vec<PropertyId> = self.property_ids.iter().cloned().collect();
            let records = ctx
                .transaction()
                .properties(ctx.site_id(), &ids)
                .await
                .map_err(LookupError::from)?;
            data.properties = records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect();
        }
        Ok(data)
    }
}

/// Parses and evaluates one lookup; failures come back as
/// `(error class, message)`.
async fn evaluate(
    ctx: &EvalContext,
    expression: &str,
) -> Result<AnyValueJson, (&'static str, String)> {
    let parsed =
        parse_lookup(expression).map_err(|err| (PARSE_ERROR_CLASS, err.to_string()))?;
    let value = parsed
        .get_concrete_value(ctx)
        .await
        .map_err(|err| (err.class(), err.to_string()))?;
    value.to_json().map_err(|err| (err.class(), err.to_string()))
}

fn check_kinds(value: &serde_json::Value) -> ReferenceResult<()> {
    let Some(object) = value.as_object() else {
        return Ok(());
    };
    if let Some(kind) = object.get("type").and_then(serde_json::Value::as_str) {
        if !KNOWN_KINDS.contains(&kind) {
            return Err(ReferenceError::unsupported(kind));
        }
    }
    if let Some(values) = object.get("values").and_then(serde_json::Value::as_array) {
        for item in values {
            check_kinds(item)?;
        }
    }
    if let Some(annotations) = object.get("annotations").and_then(serde_json::Value::as_object) {
        for annotation in annotations.values() {
            check_kinds(annotation)?;
        }
    }
    Ok(())
}
