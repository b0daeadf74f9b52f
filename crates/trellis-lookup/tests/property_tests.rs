//! Property access and entry features over a small plant/animal graph

use trellis_lookup::backend::{PropertyKind, PropertyRecord};
use trellis_lookup::test_support::{GraphBuilder, GraphFixture, ENTRY_TYPE};
use trellis_lookup::value::{FileValue, PageValue};
use trellis_lookup::{EntryId, EntryTypeId, LookupError, LookupValue, PropertyId};

const ANIMAL: &str = "_tAnimal";

/// Oak is a Tree, Tree is a Plant. The squirrel eats the oak (rank 1) and
/// the acorn (rank 2).
fn plants() -> GraphFixture {
    GraphBuilder::new()
        .entry_type(ANIMAL, "Animal")
        .entries(["_oak", "_tree", "_plant", "_acorn"])
        .named_entry("_squirrel", "Squirrel", ANIMAL)
        .is_a("_oak", "_tree")
        .is_a("_tree", "_plant")
        .property(PropertyRecord {
            id: PropertyId::new("_pColor"),
            name: "Color".to_string(),
            kind: PropertyKind::Value,
            description: String::new(),
            applies_to: vec![EntryTypeId::new(ENTRY_TYPE)],
            inheritable: true,
            default_value: None,
            rank: 0,
        })
        .property(PropertyRecord {
            id: PropertyId::new("_pHeight"),
            name: "Height".to_string(),
            kind: PropertyKind::Value,
            description: String::new(),
            applies_to: vec![EntryTypeId::new(ENTRY_TYPE)],
            inheritable: false,
            default_value: Some("\"unknown\"".to_string()),
            rank: 1,
        })
        .simple_property("_pNickname", "Nickname", PropertyKind::Value)
        .simple_property("_pOwner", "Owner", PropertyKind::Value)
        .property(PropertyRecord {
            id: PropertyId::new("_pEats"),
            name: "Eats".to_string(),
            kind: PropertyKind::RelatesTo,
            description: String::new(),
            applies_to: vec![EntryTypeId::new(ANIMAL)],
            inheritable: false,
            default_value: None,
            rank: 2,
        })
        .value("_plant", "_pColor", "\"green\"", |_| {})
        .value("_oak", "_pHeight", "30", |_| {})
        .value("_oak", "_pNickname", "\"Quercus\"", |fact| fact.rank = Some(2))
        .value("_oak", "_pNickname", "\"Mighty\"", |fact| fact.rank = Some(1))
        .value("_tree", "_pOwner", "this", |_| {})
        .relate("_pEats", "_squirrel", "_acorn", |fact| fact.rank = Some(2))
        .relate("_pEats", "_squirrel", "_oak", |fact| {
            fact.rank = Some(1);
            fact.note = Some("in *autumn*".to_string());
        })
        .image("_oak", "https://images.example/oak.webp", Some("An *old* oak"))
        .file("_oak", "measurements.csv")
        .file("_oak", "acorns.txt")
        .build()
}

fn page(value: LookupValue) -> PageValue {
    match value {
        LookupValue::Page(page) => page,
        other => panic!("expected a page, got {other:?}"),
    }
}

fn ids(page: &PageValue) -> Vec<String> {
    page.values
        .iter()
        .map(|value| value.as_entry().map(|id| id.to_string()).unwrap_or_default())
        .collect()
}

fn annotation<'a>(value: &'a LookupValue, name: &str) -> Option<&'a LookupValue> {
    value.annotations().and_then(|found| found.get(name))
}

// ============================================================================
// get() on value properties
// ============================================================================

#[tokio::test]
async fn stored_values_are_evaluated() {
    let fixture = plants();
    let result = fixture
        .evaluate(Some("_oak"), "this.get(prop=[[/prop/_pHeight]])")
        .await
        .unwrap();
    assert_eq!(result, LookupValue::integer(30));
}

#[tokio::test]
async fn missing_values_fall_back_to_the_default() {
    let fixture = plants();
    let result = fixture
        .evaluate(Some("_tree"), "this.get(prop=[[/prop/_pHeight]])")
        .await
        .unwrap();
    assert_eq!(result, LookupValue::string("unknown"));

    let result = fixture
        .evaluate(Some("_acorn"), "this.get(prop=[[/prop/_pNickname]])")
        .await
        .unwrap();
    assert_eq!(result, LookupValue::Null);
}

#[tokio::test]
async fn inheritable_values_come_from_the_nearest_ancestor() {
    let fixture = plants();
    let result = fixture
        .evaluate(Some("_oak"), "this.get(prop=[[/prop/_pColor]])")
        .await
        .unwrap();
    assert_eq!(result, LookupValue::string("green"));
}

#[tokio::test]
async fn stored_values_run_in_the_owner_scope() {
    let fixture = plants();
    let result = fixture
        .evaluate(Some("_tree"), "this.get(prop=[[/prop/_pOwner]])")
        .await
        .unwrap();
    assert_eq!(result, LookupValue::entry("_tree"));
}

#[tokio::test]
async fn several_facts_become_a_ranked_list() {
    let fixture = plants();
    let result = page(
        fixture
            .evaluate(Some("_oak"), "this.get(prop=[[/prop/_pNickname]])")
            .await
            .unwrap(),
    );
    assert_eq!(result.total_count, 2);
    assert_eq!(result.values[0].unannotated(), &LookupValue::string("Mighty"));
    assert_eq!(result.values[1].unannotated(), &LookupValue::string("Quercus"));
    assert_eq!(
        annotation(&result.values[0], "rank"),
        Some(&LookupValue::integer(1))
    );
}

#[tokio::test]
async fn get_on_a_set_annotates_the_owning_entry() {
    let fixture = plants();
    let result = page(
        fixture
            .evaluate(Some("_oak"), "this.andAncestors().get(prop=[[/prop/_pColor]])")
            .await
            .unwrap(),
    );
    assert_eq!(result.values.len(), 1);
    assert_eq!(result.values[0].unannotated(), &LookupValue::string("green"));
    assert_eq!(
        annotation(&result.values[0], "entry"),
        Some(&LookupValue::entry("_plant"))
    );
}

#[tokio::test]
async fn properties_that_do_not_apply_are_type_errors() {
    let fixture = plants();
    let err = fixture
        .evaluate(Some("_squirrel"), "this.get(prop=[[/prop/_pColor]])")
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Type(_)));
    assert!(err.to_string().contains("Squirrel"));
}

#[tokio::test]
async fn sets_skip_members_a_property_does_not_apply_to() {
    let fixture = plants();
    let values = page(
        fixture
            .evaluate(Some("_oak"), "this.andAncestors().get(prop=[[/prop/_pEats]])")
            .await
            .unwrap(),
    );
    assert!(values.values.is_empty());
    assert_eq!(values.total_count, 0);

    let values = page(
        fixture
            .evaluate(
                None,
                "[ [[/entry/_squirrel]], [[/entry/_plant]] ].get(prop=[[/prop/_pColor]])",
            )
            .await
            .unwrap(),
    );
    assert_eq!(values.total_count, 1);
    assert_eq!(values.values[0].unannotated(), &LookupValue::string("green"));
    assert_eq!(
        annotation(&values.values[0], "entry"),
        Some(&LookupValue::entry("_plant"))
    );
}

#[tokio::test]
async fn unknown_properties_are_evaluation_errors() {
    let fixture = plants();
    let err = fixture
        .evaluate(Some("_oak"), "this.get(prop=[[/prop/_pMissing]])")
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Evaluation(_)));
}

#[tokio::test]
async fn unparseable_stored_values_are_evaluation_errors() {
    let fixture = GraphBuilder::new()
        .entry("_a")
        .simple_property("_pBroken", "Broken", PropertyKind::Value)
        .value("_a", "_pBroken", "this.", |_| {})
        .build();
    let err = fixture
        .evaluate(Some("_a"), "this.get(prop=[[/prop/_pBroken]])")
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Evaluation(_)));
    assert!(err.to_string().contains("Broken"));
}

// ============================================================================
// Relationship properties: get(), reverse()
// ============================================================================

#[tokio::test]
async fn relationship_get_follows_facts_in_rank_order() {
    let fixture = plants();
    let result = page(
        fixture
            .evaluate(Some("_squirrel"), "this.get(prop=[[/prop/_pEats]])")
            .await
            .unwrap(),
    );
    assert_eq!(ids(&result), vec!["_oak", "_acorn"]);
    assert_eq!(
        annotation(&result.values[0], "note"),
        Some(&LookupValue::InlineMarkdown("in *autumn*".to_string()))
    );
    assert_eq!(
        annotation(&result.values[1], "rank"),
        Some(&LookupValue::integer(2))
    );
}

#[tokio::test]
async fn reverse_reads_facts_pointing_at_the_entry() {
    let fixture = plants();
    let result = page(
        fixture
            .evaluate(Some("_oak"), "this.reverse(prop=[[/prop/_pEats]])")
            .await
            .unwrap(),
    );
    assert_eq!(ids(&result), vec!["_squirrel"]);

    let result = page(
        fixture
            .evaluate(Some("_plant"), "this.reverse(prop=[[/prop/_pParent]])")
            .await
            .unwrap(),
    );
    assert_eq!(ids(&result), vec!["_tree"]);
}

#[tokio::test]
async fn reverse_of_a_value_property_is_a_type_error() {
    let fixture = plants();
    let err = fixture
        .evaluate(Some("_oak"), "this.reverse(prop=[[/prop/_pHeight]])")
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Type(_)));
}

// ============================================================================
// related()
// ============================================================================

/// X and Y are friends both ways, X is its own friend, Z befriends X.
fn friends() -> GraphFixture {
    GraphBuilder::new()
        .entries(["_X", "_Y", "_Z"])
        .simple_property("_pFriend", "Friend", PropertyKind::RelatesTo)
        .relate("_pFriend", "_X", "_Y", |fact| fact.weight = Some(3))
        .relate("_pFriend", "_Y", "_X", |_| {})
        .relate("_pFriend", "_X", "_X", |_| {})
        .relate("_pFriend", "_Z", "_X", |_| {})
        .build()
}

#[tokio::test]
async fn related_in_both_directions_lists_each_entry_once() {
    let fixture = friends();
    let result = page(
        fixture
            .evaluate(Some("_X"), "this.related(via=[[/prop/_pFriend]])")
            .await
            .unwrap(),
    );
    assert_eq!(ids(&result), vec!["_X", "_Y", "_Z"]);
    assert_eq!(result.total_count, 3);
    // The outgoing fact to Y wins, so its weight is kept.
    assert_eq!(
        annotation(&result.values[1], "weight"),
        Some(&LookupValue::integer(3))
    );
}

#[tokio::test]
async fn related_respects_direction() {
    let fixture = friends();
    let outgoing = page(
        fixture
            .evaluate(Some("_X"), r#"this.related(direction="from")"#)
            .await
            .unwrap(),
    );
    assert_eq!(ids(&outgoing), vec!["_X", "_Y"]);

    let incoming = page(
        fixture
            .evaluate(Some("_X"), r#"this.related(direction="to")"#)
            .await
            .unwrap(),
    );
    assert_eq!(ids(&incoming), vec!["_X", "_Y", "_Z"]);

    let from_z = page(fixture.evaluate(Some("_Z"), "this.related()").await.unwrap());
    assert_eq!(ids(&from_z), vec!["_X"]);
}

#[tokio::test]
async fn related_rejects_unknown_directions() {
    let fixture = friends();
    let err = fixture
        .evaluate(Some("_X"), r#"this.related(direction="sideways")"#)
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Evaluation(_)));
    assert!(err.to_string().contains("sideways"));
}

#[tokio::test]
async fn related_via_a_value_property_is_a_type_error() {
    let fixture = plants();
    let err = fixture
        .evaluate(Some("_oak"), "this.related(via=[[/prop/_pHeight]])")
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Type(_)));
}

// ============================================================================
// withDetail(), entryType(), graph()
// ============================================================================

#[tokio::test]
async fn with_detail_annotates_every_member() {
    let fixture = plants();
    let result = page(
        fixture
            .evaluate(
                Some("_oak"),
                "this.ancestors().withDetail(prop=[[/prop/_pColor]])",
            )
            .await
            .unwrap(),
    );
    assert_eq!(ids(&result), vec!["_tree", "_plant"]);
    for value in &result.values {
        assert_eq!(annotation(value, "detail"), Some(&LookupValue::string("green")));
        assert!(annotation(value, "distance").is_some());
    }
}

#[tokio::test]
async fn with_detail_on_a_single_entry() {
    let fixture = plants();
    let result = fixture
        .evaluate(Some("_oak"), "this.withDetail(prop=[[/prop/_pHeight]])")
        .await
        .unwrap();
    assert_eq!(result.as_entry(), Some(&EntryId::new("_oak")));
    assert_eq!(annotation(&result, "detail"), Some(&LookupValue::integer(30)));
}

#[tokio::test]
async fn with_detail_accepts_any_backend_id() {
    let fixture = GraphBuilder::new()
        .entries(["_tree-1", "_plant-1"])
        .is_a("_tree-1", "_plant-1")
        .simple_property("_pColor", "Color", PropertyKind::Value)
        .value("_plant-1", "_pColor", "\"green\"", |_| {})
        .build();

    let direct = fixture
        .evaluate(Some("_plant-1"), "this.get(prop=[[/prop/_pColor]])")
        .await
        .unwrap();
    assert_eq!(direct, LookupValue::string("green"));

    let result = page(
        fixture
            .evaluate(
                Some("_tree-1"),
                "this.ancestors().withDetail(prop=[[/prop/_pColor]])",
            )
            .await
            .unwrap(),
    );
    assert_eq!(ids(&result), vec!["_plant-1"]);
    assert_eq!(
        annotation(&result.values[0], "detail"),
        Some(&LookupValue::string("green"))
    );
}

#[tokio::test]
async fn entry_type_of_an_entry() {
    let fixture = plants();
    let result = fixture
        .evaluate(Some("_squirrel"), "this.entryType()")
        .await
        .unwrap();
    assert_eq!(result, LookupValue::EntryType(EntryTypeId::new(ANIMAL)));
}

#[tokio::test]
async fn graph_of_ancestors_includes_the_connecting_facts() {
    let fixture = plants();
    let result = fixture
        .evaluate(Some("_oak"), "this.andAncestors().graph()")
        .await
        .unwrap();
    let LookupValue::Graph(graph) = result else {
        panic!("expected a graph, got {result:?}");
    };

    let entries: Vec<(&str, bool)> = graph
        .entries
        .iter()
        .map(|entry| (entry.entry_id.as_str(), entry.is_focus_entry))
        .collect();
    assert_eq!(
        entries,
        vec![("_oak", true), ("_tree", false), ("_plant", false)]
    );

    let rels: Vec<(&str, &str)> = graph
        .rels
        .iter()
        .map(|rel| (rel.from_entry_id.as_str(), rel.to_entry_id.as_str()))
        .collect();
    assert_eq!(rels, vec![("_oak", "_tree"), ("_tree", "_plant")]);
}

// ============================================================================
// image() and files()
// ============================================================================

#[tokio::test]
async fn image_of_an_entry() {
    let fixture = plants();
    let result = fixture.evaluate(Some("_oak"), "this.image()").await.unwrap();
    let LookupValue::Image(image) = result else {
        panic!("expected an image, got {result:?}");
    };
    assert_eq!(image.entry_id, EntryId::new("_oak"));
    assert_eq!(image.alt_text, "oak");
    assert_eq!(image.caption.as_deref(), Some("An *old* oak"));

    let missing = fixture.evaluate(Some("_tree"), "this.image()").await.unwrap();
    assert_eq!(missing, LookupValue::Null);
}

#[tokio::test]
async fn image_of_a_set_uses_the_first_entry() {
    let fixture = plants();
    let result = fixture
        .evaluate(Some("_squirrel"), "this.get(prop=[[/prop/_pEats]]).image()")
        .await
        .unwrap();
    assert!(matches!(result, LookupValue::Image(_)));

    let empty = fixture
        .evaluate(Some("_plant"), "this.ancestors().image()")
        .await
        .unwrap();
    assert_eq!(empty, LookupValue::Null);
}

#[tokio::test]
async fn files_are_listed_by_filename() {
    let fixture = plants();
    let result = page(fixture.evaluate(Some("_oak"), "this.files()").await.unwrap());
    let names: Vec<&str> = result
        .values
        .iter()
        .map(|value| match value {
            LookupValue::File(FileValue { filename, .. }) => filename.as_str(),
            other => panic!("expected a file, got {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["acorns.txt", "measurements.csv"]);
    assert_eq!(result.total_count, 2);
}

#[tokio::test]
async fn counting_files_does_not_fetch_them() {
    let fixture = plants();
    fixture.graph().reset_stats();
    let result = fixture
        .evaluate(Some("_oak"), "this.files().count()")
        .await
        .unwrap();
    assert_eq!(result, LookupValue::integer(2));
    assert_eq!(fixture.graph().stats().row_counts, 1);
    assert_eq!(fixture.graph().stats().row_fetches, 0);
}
