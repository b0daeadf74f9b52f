//! Cycle-safe graph walks
//!
//! Ancestor and descendant traversal is a multi-source breadth-first search
//! over `IsA` relationship facts, with one backend read per level. Each entry
//! remembers which starting entries have already reached it; an entry is
//! expanded for at most two distinct origins. Every entry then gets its
//! minimum hop distance from a start other than itself, and cycles terminate.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::backend::{Direction, RelationshipFilter};
use crate::context::EvalContext;
use crate::error::LookupResult;
use crate::ids::EntryId;
use crate::value::{GraphEntry, GraphRel, GraphValue};

/// Origins expanded per entry. Two are enough: only one origin (the entry
/// itself) is ever excluded.
const ORIGINS_PER_ENTRY: usize = 2;

/// An entry reached by a traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reached {
    pub entry_id: EntryId,
    pub distance: u32,
}

/// Minimum `IsA` hop distance (at least 1) from any of `starts` to every
/// reachable entry, following facts in `direction` for at most `max_depth`
/// levels. A start appears only when another start reaches it; reaching
/// itself through a cycle does not count.
pub async fn shortest_distances(
    ctx: &EvalContext,
    starts: &[EntryId],
    direction: Direction,
    max_depth: u32,
) -> LookupResult<HashMap<EntryId, u32>> {
    let mut distances: HashMap<EntryId, u32> = HashMap::new();
    let mut origins: HashMap<EntryId, Vec<EntryId>> = HashMap::new();

    // (entry, origin) pairs to expand at the next level
    let mut frontier: Vec<(EntryId, EntryId)> = Vec::new();
    for start in starts {
        let seen = origins.entry(start.clone()).or_default();
        if !seen.contains(start) {
            seen.push(start.clone());
            frontier.push((start.clone(), start.clone()));
        }
    }

    let mut depth = 0;
    while !frontier.is_empty() && depth < max_depth {
        depth += 1;
        let mut read: Vec<EntryId> = Vec::new();
        let mut read_set: HashSet<&EntryId> = HashSet::new();
        for (entry, _) in &frontier {
            if read_set.insert(entry) {
                read.push(entry.clone());
            }
        }
        let facts = ctx
            .transaction()
            .relationships(ctx.site_id(), &read, &RelationshipFilter::IsA, direction)
            .await?;

        let mut neighbours: HashMap<&EntryId, Vec<&EntryId>> = HashMap::new();
        for fact in &facts {
            if matches!(direction, Direction::Outgoing | Direction::Both) {
                neighbours.entry(&fact.from_entry_id).or_default().push(&fact.to_entry_id);
            }
            if matches!(direction, Direction::Incoming | Direction::Both) {
                neighbours.entry(&fact.to_entry_id).or_default().push(&fact.from_entry_id);
            }
        }

        let mut next = Vec::new();
        for (entry, origin) in &frontier {
            let Some(reached) = neighbours.get(entry) else {
                continue;
            };
            for neighbour in reached {
                if *neighbour != origin {
                    distances.entry((*neighbour).clone()).or_insert(depth);
                }
                let seen = origins.entry((*neighbour).clone()).or_default();
                if seen.len() < ORIGINS_PER_ENTRY && !seen.contains(origin) {
                    seen.push(origin.clone());
                    next.push(((*neighbour).clone(), origin.clone()));
                }
            }
        }
        debug!(
            depth,
            frontier = frontier.len(),
            discovered = next.len(),
            "graph traversal level"
        );
        frontier = next;
    }
    Ok(distances)
}

/// Entries reachable from `starts`, ordered by (distance, name, id).
/// With `include_starts`, every start is included at distance 0.
/// Entries the backend no longer knows are dropped.
pub async fn ordered_reachable(
    ctx: &EvalContext,
    starts: &[EntryId],
    direction: Direction,
    include_starts: bool,
) -> LookupResult<Vec<Reached>> {
    let mut distances = shortest_distances(
        ctx,
        starts,
        direction,
        ctx.limits().max_traversal_depth,
    )
    .await?;
    if include_starts {
        for start in starts {
            distances.insert(start.clone(), 0);
        }
    }
    let ids: Vec<EntryId> = distances.keys().cloned().collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let records = ctx.transaction().entries(ctx.site_id(), &ids).await?;
    let mut reached: Vec<(u32, String, EntryId)> = records
        .into_iter()
        .filter_map(|record| {
            let distance = *distances.get(&record.id)?;
            Some((distance, record.name, record.id))
        })
        .collect();
    reached.sort();
    Ok(reached
        .into_iter()
        .map(|(distance, _, entry_id)| Reached { entry_id, distance })
        .collect())
}

/// The subgraph induced by `ids`: the entries themselves and every
/// relationship fact whose endpoints are both among them, each fact once.
pub async fn induced_subgraph(
    ctx: &EvalContext,
    ids: &[EntryId],
    focus: Option<&EntryId>,
) -> LookupResult<GraphValue> {
    if ids.is_empty() {
        return Ok(GraphValue::default());
    }
    let members: HashSet<&EntryId> = ids.iter().collect();

    let mut records = ctx.transaction().entries(ctx.site_id(), ids).await?;
    let position: HashMap<&EntryId, usize> =
        ids.iter().enumerate().map(|(index, id)| (id, index)).collect();
    records.sort_by_key(|record| position.get(&record.id).copied().unwrap_or(usize::MAX));
    let entries = records
        .into_iter()
        .map(|record| GraphEntry {
            is_focus_entry: focus == Some(&record.id),
            entry_id: record.id,
            name: record.name,
            entry_type_id: record.entry_type,
        })
        .collect();

    let facts = ctx
        .transaction()
        .relationships(ctx.site_id(), ids, &RelationshipFilter::Any, Direction::Outgoing)
        .await?;
    let mut seen = HashSet::new();
    let rels = facts
        .into_iter()
        .filter(|fact| members.contains(&fact.from_entry_id) && members.contains(&fact.to_entry_id))
        .filter(|fact| seen.insert(fact.id.clone()))
        .map(|fact| GraphRel {
            rel_id: fact.id,
            rel_type_id: fact.property_id,
            from_entry_id: fact.from_entry_id,
            to_entry_id: fact.to_entry_id,
        })
        .collect();

    Ok(GraphValue { entries, rels })
}
