//! Graph fixtures for tests
//!
//! [`GraphBuilder`] assembles a single-site [`MemoryGraph`] with readable
//! ids. Every fixture has one entry type (`_tThing`) and one `IsA` property
//! (`_pParent`); entries are named after their id without the underscore,
//! so `_A` is called "A" and has the friendly id `a`.
//!
//! The canned shapes:
//!
//! - [`GraphFixture::diamond`]: D is a B and a C, both of which are an A
//! - [`GraphFixture::cycle`]: A is a B, B is a C, C is an A
//! - [`GraphFixture::triangle`]: C is an A, D is an A and a B

use std::sync::Arc;

use crate::backend::{
    EntryRecord, EntryTypeRecord, FileRecord, GraphSnapshot, GraphTransaction, ImageFeature,
    MemoryGraph, PropertyFact, PropertyKind, PropertyRecord, RelationshipFact, SiteSnapshot,
};
use crate::context::EvalContext;
use crate::error::{LookupError, LookupResult};
use crate::ids::{EntryId, EntryTypeId, FactId, PropertyId, SiteId};
use crate::syntax::parse_lookup;
use crate::value::LookupValue;

pub const SITE: &str = "_site";
pub const ENTRY_TYPE: &str = "_tThing";
pub const PARENT: &str = "_pParent";

/// A built fixture graph
#[derive(Debug, Clone)]
pub struct GraphFixture {
    graph: Arc<MemoryGraph>,
    site_id: SiteId,
}

impl GraphFixture {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn diamond() -> Self {
        GraphBuilder::new()
            .entries(["_A", "_B", "_C", "_D"])
            .is_a("_D", "_B")
            .is_a("_D", "_C")
            .is_a("_B", "_A")
            .is_a("_C", "_A")
            .build()
    }

    pub fn cycle() -> Self {
        GraphBuilder::new()
            .entries(["_A", "_B", "_C"])
            .is_a("_A", "_B")
            .is_a("_B", "_C")
            .is_a("_C", "_A")
            .build()
    }

    pub fn triangle() -> Self {
        GraphBuilder::new()
            .entries(["_A", "_B", "_C", "_D"])
            .is_a("_C", "_A")
            .is_a("_D", "_A")
            .is_a("_D", "_B")
            .build()
    }

    pub fn graph(&self) -> &MemoryGraph {
        &self.graph
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    /// A context with no current entry.
    pub fn context(&self) -> EvalContext {
        let transaction: Arc<dyn GraphTransaction> = self.graph.clone();
        EvalContext::new(transaction, self.site_id.clone())
    }

    /// A context whose `this` is `entry`.
    pub fn context_for(&self, entry: &str) -> EvalContext {
        self.context().with_entry(EntryId::new(entry))
    }

    /// Parses `text` and evaluates it to a concrete value for `entry`.
    pub async fn evaluate(&self, entry: Option<&str>, text: &str) -> LookupResult<LookupValue> {
        let expr = parse_lookup(text).map_err(|err| LookupError::evaluation(err.to_string()))?;
        let ctx = match entry {
            Some(entry) => self.context_for(entry),
            None => self.context(),
        };
        expr.get_concrete_value(&ctx).await
    }
}

/// Builds a one-site graph fixture
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    site: SiteSnapshot,
    next_fact: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        let mut site = SiteSnapshot::new(SITE);
        site.entry_types.push(EntryTypeRecord {
            id: EntryTypeId::new(ENTRY_TYPE),
            name: "Thing".to_string(),
            color: None,
            abbreviation: None,
        });
        site.properties.push(PropertyRecord {
            id: PropertyId::new(PARENT),
            name: "Parent".to_string(),
            kind: PropertyKind::IsA,
            description: String::new(),
            applies_to: vec![EntryTypeId::new(ENTRY_TYPE)],
            inheritable: false,
            default_value: None,
            rank: 0,
        });
        Self { site, next_fact: 0 }
    }

    fn fact_id(&mut self) -> FactId {
        self.next_fact += 1;
        FactId::new(format!("_f{:04}", self.next_fact))
    }

    #[must_use]
    pub fn entry_type(mut self, id: &str, name: &str) -> Self {
        self.site.entry_types.push(EntryTypeRecord {
            id: EntryTypeId::new(id),
            name: name.to_string(),
            color: None,
            abbreviation: None,
        });
        self
    }

    /// An entry of the default type named after its id.
    #[must_use]
    pub fn entry(self, id: &str) -> Self {
        let name = id.trim_start_matches('_').to_string();
        self.named_entry(id, &name, ENTRY_TYPE)
    }

    #[must_use]
    pub fn entries<'a>(self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        ids.into_iter().fold(self, Self::entry)
    }

    #[must_use]
    pub fn named_entry(mut self, id: &str, name: &str, entry_type: &str) -> Self {
        self.site.entries.push(EntryRecord {
            id: EntryId::new(id),
            name: name.to_string(),
            friendly_id: name.to_lowercase().replace(' ', "-"),
            entry_type: EntryTypeId::new(entry_type),
            description: String::new(),
        });
        self
    }

    #[must_use]
    pub fn description(mut self, id: &str, markdown: &str) -> Self {
        if let Some(entry) = self.site.entries.iter_mut().find(|entry| entry.id.as_str() == id) {
            entry.description = markdown.to_string();
        }
        self
    }

    #[must_use]
    pub fn property(mut self, record: PropertyRecord) -> Self {
        self.site.properties.push(record);
        self
    }

    /// A property of `kind` applying to the default entry type.
    #[must_use]
    pub fn simple_property(self, id: &str, name: &str, kind: PropertyKind) -> Self {
        self.property(PropertyRecord {
            id: PropertyId::new(id),
            name: name.to_string(),
            kind,
            description: String::new(),
            applies_to: vec![EntryTypeId::new(ENTRY_TYPE)],
            inheritable: false,
            default_value: None,
            rank: 0,
        })
    }

    /// `child` is a `parent`, through the fixture's `IsA` property.
    #[must_use]
    pub fn is_a(self, child: &str, parent: &str) -> Self {
        self.relate(PARENT, child, parent, |_| {})
    }

    /// A relationship fact; `customize` can set rank, note, slot or weight.
    #[must_use]
    pub fn relate(
        mut self,
        property: &str,
        from: &str,
        to: &str,
        customize: impl FnOnce(&mut RelationshipFact),
    ) -> Self {
        let kind = self
            .site
            .properties
            .iter()
            .find(|record| record.id.as_str() == property)
            .map_or(PropertyKind::RelatesTo, |record| record.kind);
        let mut fact = RelationshipFact {
            id: self.fact_id(),
            property_id: PropertyId::new(property),
            kind,
            from_entry_id: EntryId::new(from),
            to_entry_id: EntryId::new(to),
            rank: None,
            note: None,
            slot: None,
            weight: None,
        };
        customize(&mut fact);
        self.site.relationships.push(fact);
        self
    }

    /// A value fact storing `expression` for `entry`.
    #[must_use]
    pub fn value(
        mut self,
        entry: &str,
        property: &str,
        expression: &str,
        customize: impl FnOnce(&mut PropertyFact),
    ) -> Self {
        let mut fact = PropertyFact {
            id: self.fact_id(),
            entry_id: EntryId::new(entry),
            property_id: PropertyId::new(property),
            value_expression: expression.to_string(),
            rank: None,
            note: None,
            slot: None,
        };
        customize(&mut fact);
        self.site.property_facts.push(fact);
        self
    }

    #[must_use]
    pub fn image(mut self, entry: &str, url: &str, caption: Option<&str>) -> Self {
        self.site.images.push(ImageFeature {
            entry_id: EntryId::new(entry),
            alt_text: String::new(),
            image_url: url.to_string(),
            content_type: "image/webp".to_string(),
            size: 2048,
            width: Some(640),
            height: Some(480),
            blur_hash: None,
            border_color: None,
            caption: caption.map(str::to_string),
        });
        self
    }

    #[must_use]
    pub fn file(mut self, entry: &str, filename: &str) -> Self {
        self.site.files.push(FileRecord {
            entry_id: EntryId::new(entry),
            filename: filename.to_string(),
            url: format!("https://files.example/{}/{filename}", entry.trim_start_matches('_')),
            content_type: "application/octet-stream".to_string(),
            size: 100,
        });
        self
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            sites: vec![self.site.clone()],
        }
    }

    pub fn build(self) -> GraphFixture {
        let site_id = self.site.id.clone();
        GraphFixture {
            graph: Arc::new(MemoryGraph::new(self.snapshot())),
            site_id,
        }
    }
}
