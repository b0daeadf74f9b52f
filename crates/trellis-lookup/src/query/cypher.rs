//! Cypher renderer
//!
//! Renders query-fragment ASTs and point reads to parameterised, read-only
//! Cypher. Every entry-set stage is a `WITH` continuation that keeps the
//! running row shape `(site, entry, ord, annotations)`, where `ord` is the
//! entry's position in the set. Materialising a window appends one
//! `RETURN ... SKIP/LIMIT` clause; counting appends `RETURN count(...)`.
//!
//! Assumes the following graph schema:
//! ```text
//! (:EntryType {id, name, color, abbreviation})-[:FOR_SITE]->(:Site {id})
//! (:Property {id, name, type, description, inheritable, default, rank})-[:FOR_SITE]->(:Site)
//! (:Property)-[:APPLIES_TO]->(:EntryType)
//! (:Entry {id, name, friendlyId, description})-[:IS_OF_TYPE]->(:EntryType)
//! (:Entry)-[:REL {factId, propertyId, kind, rank, note, slot, weight}]->(:Entry)
//! (:Entry)-[:PROP_FACT]->(:PropertyFact {id, propertyId, valueExpression, rank, note, slot})
//! (:Entry)-[:HAS_FEATURE]->(:ImageFeature {url, contentType, size, width, height, blurHash, borderColor, caption})
//! (:Entry)-[:HAS_FEATURE]->(:FilesFeature)-[:HAS_FILE]->(:DataFile {filename, url, contentType, size})
//! ```

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::backend::{Direction, RelationshipFilter};
use crate::ids::{EntryId, EntryTypeId, PropertyId, SiteId};
use crate::query::{EntrySetQuery, EntrySetSource, EntrySetStage, RowQuery, Window};

/// Sort key used for facts without a rank, so they sort last.
const UNRANKED: &str = "9223372036854775807";

/// Output from rendering
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// The generated Cypher text
    pub cypher: String,
    /// Parameters to bind to the query
    pub params: HashMap<String, Value>,
}

impl RenderedQuery {
    fn new(lines: Vec<String>, params: HashMap<String, Value>) -> Self {
        Self {
            cypher: lines.join("\n"),
            params,
        }
    }
}

// ============================================================================
// Entry sets and rows
// ============================================================================

/// One window of an entry set, returning `{id, rank, note, slot, weight}` rows.
pub fn entry_set_slice(query: &EntrySetQuery, window: Window) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = entry_set_lines(query, &mut params);
    lines.push(
        "RETURN entry.id AS id, annotations.rank AS rank, annotations.note AS note, \
         annotations.slot AS slot, annotations.weight AS weight"
            .to_string(),
    );
    lines.push("ORDER BY ord".to_string());
    push_window(&mut lines, &mut params, window);
    RenderedQuery::new(lines, params)
}

/// The size of an entry set, returning a single `{count}` row.
pub fn entry_set_count(query: &EntrySetQuery) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = entry_set_lines(query, &mut params);
    lines.push("RETURN count(entry) AS count".to_string());
    RenderedQuery::new(lines, params)
}

pub fn rows_slice(query: &RowQuery, window: Window) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = row_lines(query, &mut params);
    match query {
        RowQuery::Files { .. } => {
            lines.push(
                "RETURN entry.id AS entryId, file.filename AS filename, file.url AS url, \
                 file.contentType AS contentType, file.size AS size"
                    .to_string(),
            );
            lines.push("ORDER BY ord, file.filename".to_string());
        }
    }
    push_window(&mut lines, &mut params, window);
    RenderedQuery::new(lines, params)
}

pub fn rows_count(query: &RowQuery) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = row_lines(query, &mut params);
    match query {
        RowQuery::Files { .. } => lines.push("RETURN count(file) AS count".to_string()),
    }
    RenderedQuery::new(lines, params)
}

fn row_lines(query: &RowQuery, params: &mut HashMap<String, Value>) -> Vec<String> {
    match query {
        RowQuery::Files { entries } => {
            let mut lines = entry_set_lines(entries, params);
            lines.push(
                "MATCH (entry)-[:HAS_FEATURE]->(:FilesFeature)-[:HAS_FILE]->(file:DataFile)"
                    .to_string(),
            );
            lines
        }
    }
}

fn push_window(lines: &mut Vec<String>, params: &mut HashMap<String, Value>, window: Window) {
    params.insert("skip".to_string(), json!(window.skip));
    lines.push("SKIP $skip".to_string());
    if let Some(limit) = window.limit {
        params.insert("limit".to_string(), json!(limit));
        lines.push("LIMIT $limit".to_string());
    }
}

fn entry_set_lines(query: &EntrySetQuery, params: &mut HashMap<String, Value>) -> Vec<String> {
    params.insert("siteId".to_string(), json!(query.site()));
    let mut lines = vec!["MATCH (site:Site {id: $siteId})".to_string()];

    match query.source() {
        EntrySetSource::Entries { ids } => {
            params.insert("seedIds".to_string(), json!(ids));
            lines.push("UNWIND range(0, size($seedIds) - 1) AS ord".to_string());
            lines.push(
                "MATCH (entry:Entry {id: $seedIds[ord]})-[:IS_OF_TYPE]->(:EntryType)-[:FOR_SITE]->(site)"
                    .to_string(),
            );
            lines.push("WITH site, entry, ord, {} AS annotations".to_string());
        }
        EntrySetSource::AllEntries => {
            lines.push(
                "MATCH (entry:Entry)-[:IS_OF_TYPE]->(:EntryType)-[:FOR_SITE]->(site)".to_string(),
            );
            lines.push("WITH site, entry ORDER BY entry.name, entry.id".to_string());
            lines.push("WITH site, collect(entry) AS members".to_string());
            lines.push("UNWIND range(0, size(members) - 1) AS ord".to_string());
            lines.push("WITH site, members[ord] AS entry, ord, {} AS annotations".to_string());
        }
    }

    for (index, stage) in query.stages().iter().enumerate() {
        push_stage(&mut lines, params, index, stage);
    }
    lines
}

fn push_stage(
    lines: &mut Vec<String>,
    params: &mut HashMap<String, Value>,
    index: usize,
    stage: &EntrySetStage,
) {
    let property_param = format!("stage{index}Property");
    match stage {
        EntrySetStage::FollowProperty { property } => {
            params.insert(property_param.clone(), json!(property));
            lines.push(format!(
                "MATCH (entry)-[rel:REL {{propertyId: ${property_param}}}]->(candidate:Entry)"
            ));
            push_candidates(lines, "0 AS dir", "{rank: rel.rank, note: rel.note, slot: rel.slot}");
        }
        EntrySetStage::Reverse { property } => {
            params.insert(property_param.clone(), json!(property));
            lines.push(format!(
                "MATCH (candidate:Entry)-[rel:REL {{propertyId: ${property_param}}}]->(entry)"
            ));
            push_candidates(lines, "0 AS dir", "{rank: rel.rank, note: rel.note, slot: rel.slot}");
        }
        EntrySetStage::Related {
            property,
            direction,
        } => {
            let filter = match property {
                Some(property) => {
                    params.insert(property_param.clone(), json!(property));
                    format!(" WHERE rel.propertyId = ${property_param}")
                }
                None => String::new(),
            };
            let annotations = "{weight: rel.weight, note: rel.note}";
            match direction {
                Direction::Outgoing => {
                    lines.push(format!("MATCH (entry)-[rel:REL]->(candidate:Entry){filter}"));
                    push_candidates(lines, "0 AS dir", annotations);
                }
                Direction::Incoming => {
                    lines.push(format!("MATCH (entry)<-[rel:REL]-(candidate:Entry){filter}"));
                    push_candidates(lines, "1 AS dir", annotations);
                }
                Direction::Both => {
                    lines.push("CALL {".to_string());
                    lines.push("  WITH entry".to_string());
                    lines.push(format!("  MATCH (entry)-[rel:REL]->(candidate:Entry){filter}"));
                    lines.push("  RETURN rel, candidate, 0 AS dir".to_string());
                    lines.push("  UNION".to_string());
                    lines.push("  WITH entry".to_string());
                    lines.push(format!("  MATCH (entry)<-[rel:REL]-(candidate:Entry){filter}"));
                    lines.push("  RETURN rel, candidate, 1 AS dir".to_string());
                    lines.push("}".to_string());
                    push_candidates(lines, "dir", annotations);
                }
            }
        }
    }
}

/// Orders the stage's candidates, keeps the first occurrence of each entry
/// and renumbers `ord`.
fn push_candidates(lines: &mut Vec<String>, dir: &str, annotations: &str) {
    lines.push(format!(
        "WITH site, candidate, ord, {dir}, {annotations} AS annotations, coalesce(rel.rank, {UNRANKED}) AS sortRank"
    ));
    lines.push("ORDER BY ord, dir, sortRank, candidate.name, candidate.id".to_string());
    lines.push(
        "WITH site, collect({entry: candidate, annotations: annotations}) AS candidates".to_string(),
    );
    lines.push(
        "WITH site, reduce(acc = {seen: [], rows: []}, row IN candidates | \
         CASE WHEN row.entry.id IN acc.seen THEN acc \
         ELSE {seen: acc.seen + [row.entry.id], rows: acc.rows + [row]} END).rows AS rows"
            .to_string(),
    );
    lines.push("UNWIND range(0, size(rows) - 1) AS ord".to_string());
    lines.push("WITH site, rows[ord].entry AS entry, ord, rows[ord].annotations AS annotations".to_string());
}

// ============================================================================
// Point reads
// ============================================================================

fn site_lines(site: &SiteId, params: &mut HashMap<String, Value>) -> Vec<String> {
    params.insert("siteId".to_string(), json!(site));
    vec!["MATCH (site:Site {id: $siteId})".to_string()]
}

const ENTRY_COLUMNS: &str = "RETURN entry.id AS id, entry.name AS name, entry.friendlyId AS friendlyId, \
     entryType.id AS entryType, coalesce(entry.description, '') AS description";

pub fn entries(site: &SiteId, ids: &[EntryId]) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = site_lines(site, &mut params);
    params.insert("entryIds".to_string(), json!(ids));
    lines.push(
        "MATCH (entry:Entry)-[:IS_OF_TYPE]->(entryType:EntryType)-[:FOR_SITE]->(site)".to_string(),
    );
    lines.push("WHERE entry.id IN $entryIds".to_string());
    lines.push(ENTRY_COLUMNS.to_string());
    RenderedQuery::new(lines, params)
}

pub fn entries_by_friendly_id(site: &SiteId, friendly_ids: &[String]) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = site_lines(site, &mut params);
    params.insert("friendlyIds".to_string(), json!(friendly_ids));
    lines.push(
        "MATCH (entry:Entry)-[:IS_OF_TYPE]->(entryType:EntryType)-[:FOR_SITE]->(site)".to_string(),
    );
    lines.push("WHERE entry.friendlyId IN $friendlyIds".to_string());
    lines.push(ENTRY_COLUMNS.to_string());
    RenderedQuery::new(lines, params)
}

pub fn entry_types(site: &SiteId, ids: &[EntryTypeId]) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = site_lines(site, &mut params);
    params.insert("entryTypeIds".to_string(), json!(ids));
    lines.push("MATCH (entryType:EntryType)-[:FOR_SITE]->(site)".to_string());
    lines.push("WHERE entryType.id IN $entryTypeIds".to_string());
    lines.push(
        "RETURN entryType.id AS id, entryType.name AS name, entryType.color AS color, \
         entryType.abbreviation AS abbreviation"
            .to_string(),
    );
    RenderedQuery::new(lines, params)
}

pub fn properties(site: &SiteId, ids: &[PropertyId]) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = site_lines(site, &mut params);
    params.insert("propertyIds".to_string(), json!(ids));
    lines.push("MATCH (property:Property)-[:FOR_SITE]->(site)".to_string());
    lines.push("WHERE property.id IN $propertyIds".to_string());
    lines.push(
        "RETURN property.id AS id, property.name AS name, property.type AS type, \
         coalesce(property.description, '') AS description, \
         [(property)-[:APPLIES_TO]->(appliesTo:EntryType) | appliesTo.id] AS appliesTo, \
         coalesce(property.inheritable, false) AS inheritable, property.default AS default, \
         coalesce(property.rank, 0) AS rank"
            .to_string(),
    );
    RenderedQuery::new(lines, params)
}

pub fn relationships(
    site: &SiteId,
    entries: &[EntryId],
    filter: &RelationshipFilter,
    direction: Direction,
) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = site_lines(site, &mut params);
    params.insert("entryIds".to_string(), json!(entries));
    lines.push(
        "MATCH (fromEntry:Entry)-[:IS_OF_TYPE]->(:EntryType)-[:FOR_SITE]->(site)".to_string(),
    );
    lines.push("MATCH (fromEntry)-[rel:REL]->(toEntry:Entry)".to_string());
    let endpoint = match direction {
        Direction::Outgoing => "fromEntry.id IN $entryIds",
        Direction::Incoming => "toEntry.id IN $entryIds",
        Direction::Both => "(fromEntry.id IN $entryIds OR toEntry.id IN $entryIds)",
    };
    let kind = match filter {
        RelationshipFilter::IsA => " AND rel.kind = 'IsA'".to_string(),
        RelationshipFilter::Property(property) => {
            params.insert("propertyId".to_string(), json!(property));
            " AND rel.propertyId = $propertyId".to_string()
        }
        RelationshipFilter::Any => String::new(),
    };
    lines.push(format!("WHERE {endpoint}{kind}"));
    lines.push(
        "RETURN rel.factId AS id, rel.propertyId AS propertyId, rel.kind AS kind, \
         fromEntry.id AS fromEntryId, toEntry.id AS toEntryId, rel.rank AS rank, \
         rel.note AS note, rel.slot AS slot, rel.weight AS weight"
            .to_string(),
    );
    lines.push("ORDER BY rel.factId".to_string());
    RenderedQuery::new(lines, params)
}

pub fn property_facts(site: &SiteId, entries: &[EntryId], property: &PropertyId) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = site_lines(site, &mut params);
    params.insert("entryIds".to_string(), json!(entries));
    params.insert("propertyId".to_string(), json!(property));
    lines.push("MATCH (entry:Entry)-[:IS_OF_TYPE]->(:EntryType)-[:FOR_SITE]->(site)".to_string());
    lines.push("WHERE entry.id IN $entryIds".to_string());
    lines.push(
        "MATCH (entry)-[:PROP_FACT]->(fact:PropertyFact {propertyId: $propertyId})".to_string(),
    );
    lines.push(
        "RETURN fact.id AS id, entry.id AS entryId, fact.propertyId AS propertyId, \
         fact.valueExpression AS valueExpression, fact.rank AS rank, fact.note AS note, \
         fact.slot AS slot"
            .to_string(),
    );
    lines.push("ORDER BY entry.id, fact.rank, fact.id".to_string());
    RenderedQuery::new(lines, params)
}

pub fn image_features(site: &SiteId, entries: &[EntryId]) -> RenderedQuery {
    let mut params = HashMap::new();
    let mut lines = site_lines(site, &mut params);
    params.insert("entryIds".to_string(), json!(entries));
    lines.push("MATCH (entry:Entry)-[:IS_OF_TYPE]->(:EntryType)-[:FOR_SITE]->(site)".to_string());
    lines.push("WHERE entry.id IN $entryIds".to_string());
    lines.push("MATCH (entry)-[:HAS_FEATURE]->(image:ImageFeature)".to_string());
    lines.push(
        "RETURN entry.id AS entryId, entry.name AS altText, image.url AS imageUrl, \
         image.contentType AS contentType, image.size AS size, image.width AS width, \
         image.height AS height, image.blurHash AS blurHash, image.borderColor AS borderColor, \
         image.caption AS caption"
            .to_string(),
    );
    RenderedQuery::new(lines, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn site() -> SiteId {
        SiteId::new("_site")
    }

    fn assert_read_only(query: &RenderedQuery) {
        let writes = Regex::new(r"\b(CREATE|MERGE|SET|DELETE|REMOVE|DETACH)\b").unwrap();
        assert!(
            !writes.is_match(&query.cypher),
            "query must not write:\n{}",
            query.cypher
        );
    }

    #[test]
    fn seeded_slice_binds_ids_and_window() {
        let query = EntrySetQuery::from_entries(site(), [EntryId::new("_a"), EntryId::new("_b")]);
        let rendered = entry_set_slice(&query, Window::new(5, 10));

        assert!(rendered.cypher.starts_with("MATCH (site:Site {id: $siteId})"));
        assert!(rendered.cypher.contains("UNWIND range(0, size($seedIds) - 1) AS ord"));
        assert!(rendered.cypher.ends_with("ORDER BY ord\nSKIP $skip\nLIMIT $limit"));
        assert_eq!(rendered.params["seedIds"], json!(["_a", "_b"]));
        assert_eq!(rendered.params["skip"], json!(5));
        assert_eq!(rendered.params["limit"], json!(10));
        assert_read_only(&rendered);
    }

    #[test]
    fn unbounded_window_omits_limit() {
        let query = EntrySetQuery::all_entries(site());
        let rendered = entry_set_slice(&query, Window::all());
        assert!(!rendered.cypher.contains("LIMIT"));
        assert!(!rendered.params.contains_key("limit"));
    }

    #[test]
    fn each_stage_is_a_with_continuation() {
        let query = EntrySetQuery::from_entries(site(), [EntryId::new("_a")])
            .then(EntrySetStage::FollowProperty {
                property: PropertyId::new("_p1"),
            })
            .then(EntrySetStage::Reverse {
                property: PropertyId::new("_p2"),
            });
        let rendered = entry_set_count(&query);

        assert_eq!(rendered.params["stage0Property"], json!("_p1"));
        assert_eq!(rendered.params["stage1Property"], json!("_p2"));
        assert_eq!(
            rendered.cypher.matches("UNWIND range(0, size(rows) - 1) AS ord").count(),
            2
        );
        assert!(rendered.cypher.ends_with("RETURN count(entry) AS count"));
        assert_read_only(&rendered);
    }

    #[test]
    fn related_both_unions_outgoing_before_incoming() {
        let query = EntrySetQuery::from_entries(site(), [EntryId::new("_a")]).then(
            EntrySetStage::Related {
                property: None,
                direction: Direction::Both,
            },
        );
        let rendered = entry_set_slice(&query, Window::first(10));

        let outgoing = rendered.cypher.find("RETURN rel, candidate, 0 AS dir").unwrap();
        let incoming = rendered.cypher.find("RETURN rel, candidate, 1 AS dir").unwrap();
        assert!(outgoing < incoming);
        assert!(rendered.cypher.contains("CASE WHEN row.entry.id IN acc.seen"));
        assert!(!rendered.params.contains_key("stage0Property"));
    }

    #[test]
    fn files_rows_follow_the_entry_set() {
        let rows = RowQuery::Files {
            entries: EntrySetQuery::from_entries(site(), [EntryId::new("_a")]),
        };
        let rendered = rows_slice(&rows, Window::first(3));
        assert!(rendered.cypher.contains("[:HAS_FILE]->(file:DataFile)"));
        assert!(rendered.cypher.contains("ORDER BY ord, file.filename"));
        assert!(rows_count(&rows).cypher.ends_with("RETURN count(file) AS count"));
    }

    #[test]
    fn relationship_reads_filter_by_direction_and_kind() {
        let rendered = relationships(
            &site(),
            &[EntryId::new("_a")],
            &RelationshipFilter::IsA,
            Direction::Outgoing,
        );
        assert!(rendered
            .cypher
            .contains("WHERE fromEntry.id IN $entryIds AND rel.kind = 'IsA'"));
        assert_read_only(&rendered);

        let rendered = relationships(
            &site(),
            &[EntryId::new("_a")],
            &RelationshipFilter::Property(PropertyId::new("_p")),
            Direction::Both,
        );
        assert!(rendered.cypher.contains("OR toEntry.id IN $entryIds"));
        assert_eq!(rendered.params["propertyId"], json!("_p"));
    }
}
