//! End-to-end evaluation against in-memory fixture graphs
//!
//! Every test parses real lookup text and evaluates it to a concrete value,
//! so these cover the parser, the evaluator and the memory backend together.

use trellis_lookup::test_support::GraphFixture;
use trellis_lookup::value::PageValue;
use trellis_lookup::{EntryId, LookupError, LookupValue};
use test_case::test_case;

fn page(value: LookupValue) -> PageValue {
    match value {
        LookupValue::Page(page) => page,
        other => panic!("expected a page, got {other:?}"),
    }
}

/// `(entry id, distance)` for each member of an ancestors/descendants page.
fn distances(value: LookupValue) -> Vec<(String, i64)> {
    page(value)
        .values
        .into_iter()
        .map(|value| {
            let id = value.as_entry().map(|id| id.to_string()).unwrap_or_default();
            let distance = match value.annotations().and_then(|found| found.get("distance")) {
                Some(LookupValue::Integer(distance)) => i64::try_from(distance).unwrap(),
                other => panic!("missing distance annotation: {other:?}"),
            };
            (id, distance)
        })
        .collect()
}

fn entry_ids(value: LookupValue) -> Vec<String> {
    page(value)
        .values
        .iter()
        .map(|value| value.as_entry().map(|id| id.to_string()).unwrap_or_default())
        .collect()
}

fn pairs(expected: &[(&str, i64)]) -> Vec<(String, i64)> {
    expected
        .iter()
        .map(|(id, distance)| (id.to_string(), *distance))
        .collect()
}

// ============================================================================
// Ancestors and descendants
// ============================================================================

#[tokio::test]
async fn ancestors_on_the_triangle() {
    let fixture = GraphFixture::triangle();
    let result = fixture.evaluate(Some("_D"), "this.ancestors()").await.unwrap();
    assert_eq!(distances(result), pairs(&[("_A", 1), ("_B", 1)]));

    let result = fixture.evaluate(Some("_C"), "this.andAncestors()").await.unwrap();
    assert_eq!(distances(result), pairs(&[("_C", 0), ("_A", 1)]));
}

#[tokio::test]
async fn descendants_on_the_triangle() {
    let fixture = GraphFixture::triangle();
    let result = fixture.evaluate(Some("_A"), "this.descendants()").await.unwrap();
    assert_eq!(distances(result), pairs(&[("_C", 1), ("_D", 1)]));

    let result = fixture
        .evaluate(Some("_B"), "this.andDescendants()")
        .await
        .unwrap();
    assert_eq!(distances(result), pairs(&[("_B", 0), ("_D", 1)]));
}

#[tokio::test]
async fn ancestors_of_several_entries_keep_a_start_reached_from_another() {
    let fixture = GraphFixture::diamond();
    let result = fixture
        .evaluate(None, "[ [[/entry/_D]], [[/entry/_B]] ].ancestors()")
        .await
        .unwrap();
    assert_eq!(distances(result), pairs(&[("_A", 1), ("_B", 1), ("_C", 1)]));
}

#[tokio::test]
async fn diamond_ancestors_use_the_shortest_distance() {
    let fixture = GraphFixture::diamond();
    let result = fixture.evaluate(Some("_D"), "this.ancestors()").await.unwrap();
    assert_eq!(distances(result), pairs(&[("_B", 1), ("_C", 1), ("_A", 2)]));

    let result = fixture.evaluate(Some("_A"), "this.descendants()").await.unwrap();
    assert_eq!(distances(result), pairs(&[("_B", 1), ("_C", 1), ("_D", 2)]));
}

#[tokio::test]
async fn cycles_terminate_and_exclude_the_start() {
    let fixture = GraphFixture::cycle();
    let result = fixture.evaluate(Some("_A"), "this.ancestors()").await.unwrap();
    assert_eq!(distances(result), pairs(&[("_B", 1), ("_C", 2)]));

    let result = fixture.evaluate(Some("_A"), "this.andAncestors()").await.unwrap();
    assert_eq!(distances(result), pairs(&[("_A", 0), ("_B", 1), ("_C", 2)]));
}

#[tokio::test]
async fn entry_without_parents_has_no_ancestors() {
    let fixture = GraphFixture::triangle();
    let result = fixture.evaluate(Some("_A"), "this.ancestors()").await.unwrap();
    let result = page(result);
    assert_eq!(result.total_count, 0);
    assert!(result.values.is_empty());
}

#[tokio::test]
async fn ancestors_of_an_entry_reference() {
    let fixture = GraphFixture::triangle();
    let by_id = fixture
        .evaluate(None, "[[/entry/_D]].ancestors()")
        .await
        .unwrap();
    let by_friendly_id = fixture
        .evaluate(None, "[[/entry/d]].ancestors()")
        .await
        .unwrap();
    assert_eq!(entry_ids(by_id), vec!["_A", "_B"]);
    assert_eq!(entry_ids(by_friendly_id), vec!["_A", "_B"]);
}

#[tokio::test]
async fn concrete_pages_remember_their_source() {
    let fixture = GraphFixture::triangle();
    let result = page(fixture.evaluate(Some("_D"), "this.ancestors()").await.unwrap());
    let source = result.source.expect("lazy results carry a source");
    assert_eq!(source.expression.to_string(), "this.ancestors()");
    assert_eq!(source.entry_id, Some(EntryId::new("_D")));
    assert_eq!(result.started_at, 0);
    assert_eq!(result.page_size, 10);
    assert_eq!(result.total_count, 2);
}

// ============================================================================
// Scope and references
// ============================================================================

#[tokio::test]
async fn this_without_an_entry_is_a_scope_error() {
    let fixture = GraphFixture::triangle();
    let err = fixture.evaluate(None, "this.ancestors()").await.unwrap_err();
    assert!(matches!(err, LookupError::Scope(_)));
    assert_eq!(err.class(), "LookupScopeError");
}

#[tokio::test]
async fn unknown_friendly_ids_are_evaluation_errors() {
    let fixture = GraphFixture::triangle();
    let err = fixture
        .evaluate(None, "[[/entry/no-such-entry]]")
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Evaluation(_)));
    assert!(err.to_string().contains("no-such-entry"));
}

#[tokio::test]
async fn unbound_placeholders_are_evaluation_errors() {
    let fixture = GraphFixture::triangle();
    let err = fixture.evaluate(None, "$entry.ancestors()").await.unwrap_err();
    assert!(matches!(err, LookupError::Evaluation(_)));
}

// ============================================================================
// count() and first()
// ============================================================================

#[tokio::test]
async fn count_of_a_literal_list_counts_nulls() {
    let fixture = GraphFixture::triangle();
    let result = fixture.evaluate(None, "count([1, 2, null])").await.unwrap();
    assert_eq!(result, LookupValue::integer(3));
}

#[tokio::test]
async fn count_of_an_entry_set_is_a_single_count_read() {
    let fixture = GraphFixture::diamond();
    fixture.graph().reset_stats();
    let result = fixture.evaluate(None, "allEntries().count()").await.unwrap();
    assert_eq!(result, LookupValue::integer(4));

    let stats = fixture.graph().stats();
    assert_eq!(stats.entry_set_counts, 1);
    assert_eq!(stats.entry_set_fetches, 0);
}

#[tokio::test]
async fn counting_a_scalar_is_not_countable() {
    let fixture = GraphFixture::triangle();
    let err = fixture.evaluate(None, "count(5)").await.unwrap_err();
    assert!(matches!(err, LookupError::NotCountable(_)));
}

#[test_case("first([])", LookupValue::Null ; "empty list")]
#[test_case("first([3, 4])", LookupValue::integer(3) ; "list")]
#[test_case(r#"first("日本")"#, LookupValue::string("日") ; "cjk string")]
#[test_case(r#"first("")"#, LookupValue::Null ; "empty string")]
#[tokio::test]
async fn first_of_sequences_and_strings(text: &str, expected: LookupValue) {
    let fixture = GraphFixture::triangle();
    assert_eq!(fixture.evaluate(None, text).await.unwrap(), expected);
}

#[tokio::test]
async fn first_keeps_grapheme_clusters_together() {
    let fixture = GraphFixture::triangle();
    let result = fixture.evaluate(None, "first(\"e\u{301}cole\")").await.unwrap();
    assert_eq!(result, LookupValue::string("e\u{301}"));
}

#[tokio::test]
async fn first_of_an_entry_set_reads_one_entry() {
    let fixture = GraphFixture::diamond();
    fixture.graph().reset_stats();
    let result = fixture.evaluate(None, "allEntries().first()").await.unwrap();
    assert_eq!(result, LookupValue::entry("_A"));
    assert_eq!(fixture.graph().stats().entry_set_fetches, 1);
    assert_eq!(fixture.graph().stats().entry_set_counts, 0);
}

#[tokio::test]
async fn first_of_a_huge_integer_names_the_shortened_expression() {
    let fixture = GraphFixture::triangle();
    let digits = "123456789012345678901234567890123456789012345678901234567890123456";
    assert_eq!(digits.len(), 66);

    let err = fixture
        .evaluate(None, &format!("first({digits})"))
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Type(_)));
    assert_eq!(err.class(), "LookupTypeError");

    let shortened = format!("{}…{}", &digits[..45], &digits[61..]);
    assert!(
        err.to_string().contains(&shortened),
        "message was {err}"
    );
}

// ============================================================================
// if()
// ============================================================================

#[test_case("if(false)", LookupValue::Null ; "false")]
#[test_case("if(0)", LookupValue::Null ; "zero")]
#[test_case(r#"if("")"#, LookupValue::Null ; "empty string")]
#[test_case("if([])", LookupValue::Null ; "empty list")]
#[test_case("if(null)", LookupValue::Null ; "null")]
#[test_case("if(true)", LookupValue::Boolean(true) ; "true")]
#[test_case("if(-1)", LookupValue::integer(-1) ; "negative one")]
#[test_case(r#"if("x")"#, LookupValue::string("x") ; "non empty string")]
#[test_case(r#"if(true, then="yes", else="no")"# , LookupValue::string("yes") ; "then branch")]
#[test_case(r#"if(0, then="yes", else="no")"# , LookupValue::string("no") ; "else branch")]
#[test_case(r#"if(0, then="yes")"# , LookupValue::Null ; "missing else")]
#[tokio::test]
async fn if_truthiness(text: &str, expected: LookupValue) {
    let fixture = GraphFixture::triangle();
    assert_eq!(fixture.evaluate(None, text).await.unwrap(), expected);
}

#[tokio::test]
async fn if_returns_a_truthy_list_itself() {
    let fixture = GraphFixture::triangle();
    let result = page(fixture.evaluate(None, "if([1, 2, 3])").await.unwrap());
    assert_eq!(
        result.values,
        vec![
            LookupValue::integer(1),
            LookupValue::integer(2),
            LookupValue::integer(3)
        ]
    );
    assert_eq!(result.total_count, 3);
}

#[tokio::test]
async fn if_with_an_empty_entry_set_takes_the_else_branch() {
    let fixture = GraphFixture::triangle();
    let result = fixture
        .evaluate(Some("_A"), r#"if(this.ancestors(), then="has parents", else="root")"#)
        .await
        .unwrap();
    assert_eq!(result, LookupValue::string("root"));
}

#[tokio::test]
async fn untaken_branches_are_not_evaluated() {
    let fixture = GraphFixture::triangle();
    // `this` would be a scope error if the else branch ran.
    let result = fixture
        .evaluate(None, "if(1, then=2, else=this)")
        .await
        .unwrap();
    assert_eq!(result, LookupValue::integer(2));
}

// ============================================================================
// slice()
// ============================================================================

fn ten_entries() -> GraphFixture {
    GraphFixture::builder()
        .entries(["_E0", "_E1", "_E2", "_E3", "_E4", "_E5", "_E6", "_E7", "_E8", "_E9"])
        .build()
}

fn ids(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|index| format!("_E{index}")).collect()
}

#[test_case("allEntries().slice(start=2, size=3)", 2, 3, ids(2..5) ; "start and size")]
#[test_case("allEntries().slice(start=-3)", 7, 3, ids(7..10) ; "negative start")]
#[test_case("allEntries().slice(start=-30)", 0, 10, ids(0..10) ; "start clamps")]
#[test_case("allEntries().slice(end=500)", 0, 10, ids(0..10) ; "end clamps")]
#[test_case("allEntries().slice(start=5, end=8, size=2)", 5, 2, ids(5..7) ; "size shrinks end")]
#[test_case("allEntries().slice(start=8, end=2)", 8, 0, Vec::new() ; "end before start")]
#[test_case("allEntries().slice(start=99999999999999999999999)", 10, 0, Vec::new() ; "huge start")]
#[tokio::test]
async fn slices_of_all_entries(text: &str, started_at: u64, page_size: u64, expected: Vec<String>) {
    let fixture = ten_entries();
    let result = page(fixture.evaluate(None, text).await.unwrap());
    assert_eq!(result.started_at, started_at);
    assert_eq!(result.page_size, page_size);
    assert_eq!(result.total_count, 10);
    let found: Vec<String> = result
        .values
        .iter()
        .map(|value| value.as_entry().map(|id| id.to_string()).unwrap_or_default())
        .collect();
    assert_eq!(found, expected);
}

#[tokio::test]
async fn empty_slices_do_not_fetch() {
    let fixture = ten_entries();
    fixture.graph().reset_stats();
    fixture
        .evaluate(None, "allEntries().slice(start=4, size=0)")
        .await
        .unwrap();
    let stats = fixture.graph().stats();
    assert_eq!(stats.entry_set_counts, 1);
    assert_eq!(stats.entry_set_fetches, 0);
}

#[tokio::test]
async fn slicing_a_list() {
    let fixture = GraphFixture::triangle();
    let result = page(
        fixture
            .evaluate(None, "[1, 2, 3, 4].slice(start=1, end=-1)")
            .await
            .unwrap(),
    );
    assert_eq!(
        result.values,
        vec![LookupValue::integer(2), LookupValue::integer(3)]
    );
    assert_eq!(result.started_at, 1);
    assert_eq!(result.total_count, 4);
}

#[tokio::test]
async fn slicing_a_scalar_is_not_iterable() {
    let fixture = GraphFixture::triangle();
    let err = fixture
        .evaluate(None, r#""text".slice(start=1)"#)
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::NotIterable(_)));
}

#[tokio::test]
async fn non_integer_bounds_are_type_errors() {
    let fixture = ten_entries();
    let err = fixture
        .evaluate(None, r#"allEntries().slice(start="two")"#)
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Type(_)));
}

// ============================================================================
// date() and markdown()
// ============================================================================

#[tokio::test]
async fn dates_are_validated() {
    let fixture = GraphFixture::triangle();
    let result = fixture.evaluate(None, r#"date("2024-02-29")"#).await.unwrap();
    assert_eq!(
        result,
        LookupValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
    );

    let err = fixture
        .evaluate(None, r#"date("2023-02-29")"#)
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Evaluation(_)));
}

#[tokio::test]
async fn markdown_wraps_strings() {
    let fixture = GraphFixture::triangle();
    let result = fixture.evaluate(None, r#"markdown("*hi*")"#).await.unwrap();
    assert_eq!(result, LookupValue::InlineMarkdown("*hi*".to_string()));

    let err = fixture.evaluate(None, "markdown(5)").await.unwrap_err();
    assert!(matches!(err, LookupError::Type(_)));
}
