//! Fixed-point resolution against an in-memory graph

use std::collections::BTreeMap;

use trellis_lookup::backend::PropertyKind;
use trellis_lookup::test_support::{GraphBuilder, GraphFixture};
use trellis_lookup::{EntryId, EntryTypeId, PropertyId, ValueJson};
use trellis_references::{
    ExtractionLimits, ReferenceCache, ReferenceData, PARSE_ERROR_CLASS,
};

/// Oak is a Tree is a Plant; descriptions link onwards and embed lookups.
fn garden() -> GraphFixture {
    GraphBuilder::new()
        .entries(["_oak", "_tree", "_plant", "_rock"])
        .simple_property("_pHeight", "Height", PropertyKind::Value)
        .is_a("_oak", "_tree")
        .is_a("_tree", "_plant")
        .description(
            "_oak",
            "An oak is a [tree](/entry/tree).\n\nParents: `{ this.ancestors() }`",
        )
        .description("_tree", "Trees are [plants](/entry/_plant).")
        .description(
            "_rock",
            "`{ this.get(prop=[[/prop/_pMissing]]) }` and `{ this. }`",
        )
        .build()
}

fn ids<V>(map: &BTreeMap<EntryId, V>) -> Vec<&str> {
    map.keys().map(EntryId::as_str).collect()
}

#[tokio::test]
async fn follows_links_and_lookups_to_a_fixed_point() {
    let fixture = garden();
    let mut cache = ReferenceCache::new();
    cache.extract_markdown_references("Look at the [oak](/entry/oak) and [this](/entry/_nope).", None);

    let data = cache.get_data(&fixture.context()).await.unwrap();

    assert_eq!(ids(&data.entries), vec!["_oak", "_plant", "_tree"]);
    assert!(data.entry_types.contains_key(&EntryTypeId::new("_tThing")));
    assert!(data.properties.is_empty());

    assert_eq!(data.lookups.len(), 1);
    let lookup = &data.lookups[0];
    assert_eq!(lookup.entry_context, Some(EntryId::new("_oak")));
    assert_eq!(lookup.lookup_expression, "this.ancestors()");
    let ValueJson::Page { total_count, .. } = &lookup.value.value else {
        panic!("expected a page, got {:?}", lookup.value);
    };
    assert_eq!(*total_count, 2);
}

#[tokio::test]
async fn failing_lookups_become_error_values() {
    let fixture = garden();
    let mut cache = ReferenceCache::new();
    cache.add_entry(EntryId::new("_rock"));

    let data = cache.get_data(&fixture.context()).await.unwrap();
    assert_eq!(data.lookups.len(), 2);

    let classes: Vec<&str> = data
        .lookups
        .iter()
        .map(|lookup| match &lookup.value.value {
            ValueJson::Error { error_class, .. } => error_class.as_str(),
            other => panic!("expected an error, got {other:?}"),
        })
        .collect();
    assert_eq!(classes, vec!["LookupEvaluationError", PARSE_ERROR_CLASS]);

    // Referenced but unknown, so not loaded.
    assert!(data.properties.get(&PropertyId::new("_pMissing")).is_none());
}

#[tokio::test]
async fn round_limit_stops_extraction() {
    let fixture = garden();
    let mut cache = ReferenceCache::new().with_limits(ExtractionLimits {
        lookup_page_size: 10,
        max_rounds: 1,
    });
    cache.extract_markdown_references("[oak](/entry/oak)", None);

    let data = cache.get_data(&fixture.context()).await.unwrap();
    assert_eq!(ids(&data.entries), vec!["_oak"]);
    assert!(data.lookups.is_empty());
    assert_eq!(cache.pending_lookups(), 1);
}

#[tokio::test]
async fn lookup_pages_respect_the_extraction_page_size() {
    let fixture = garden();
    let mut cache = ReferenceCache::new().with_limits(ExtractionLimits {
        lookup_page_size: 1,
        max_rounds: 8,
    });
    cache.add_lookup("this.ancestors()", Some(&EntryId::new("_oak")));

    let data = cache.get_data(&fixture.context()).await.unwrap();
    let ValueJson::Page {
        values,
        page_size,
        total_count,
        ..
    } = &data.lookups[0].value.value
    else {
        panic!("expected a page");
    };
    assert_eq!(values.len(), 1);
    assert_eq!(*page_size, 1);
    assert_eq!(*total_count, 2);
}

#[tokio::test]
async fn extraction_is_idempotent() {
    let fixture = garden();
    let ctx = fixture.context_for("_oak");
    let value = trellis_lookup::parse_lookup("this.andAncestors().graph()")
        .unwrap()
        .get_concrete_value(&ctx)
        .await
        .unwrap()
        .to_json()
        .unwrap();

    let mut once = ReferenceCache::new();
    once.extract_lookup_references(&value, Some(&EntryId::new("_oak")));
    let first: ReferenceData = once.get_data(&fixture.context()).await.unwrap();

    let mut twice = ReferenceCache::new();
    twice.extract_lookup_references(&value, Some(&EntryId::new("_oak")));
    twice.extract_lookup_references(&value, Some(&EntryId::new("_oak")));
    let second = twice.get_data(&fixture.context()).await.unwrap();
    assert_eq!(first, second);

    // Asking again adds nothing new.
    let again = twice.get_data(&fixture.context()).await.unwrap();
    assert_eq!(second, again);
    assert!(second.properties.contains_key(&PropertyId::new("_pParent")));
}

#[tokio::test]
async fn reference_data_serializes_in_camel_case() {
    let fixture = garden();
    let mut cache = ReferenceCache::new();
    cache.add_lookup("[[/entry/_plant]]", Some(&EntryId::new("_tree")));

    let data = cache.get_data(&fixture.context()).await.unwrap();
    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["entries"]["_plant"]["friendlyId"], "plant");
    assert_eq!(json["entryTypes"]["_tThing"]["name"], "Thing");
    assert_eq!(json["lookups"][0]["entryContext"], "_tree");
    assert_eq!(json["lookups"][0]["lookupExpression"], "[[/entry/_plant]]");
    assert_eq!(json["lookups"][0]["value"]["type"], "Entry");
}
