//! Graph navigation: `allEntries`, ancestors and descendants, `related`,
//! `graph`.

use super::{property, LookupExpression, RelatedLookup};
use crate::backend::Direction;
use crate::context::EvalContext;
use crate::error::{LookupError, LookupResult};
use crate::graph;
use crate::ids::EntryId;
use crate::query::{EntrySetQuery, EntrySetStage};
use crate::value::{Annotations, LazyEntrySet, LookupValue, ValueKind};

/// `value` (produced by `expr`) as an entry set, or a type error naming `expr`.
pub(super) fn entry_set_of(
    ctx: &EvalContext,
    expr: &LookupExpression,
    value: &LookupValue,
) -> LookupResult<LazyEntrySet> {
    match value.cast_to(ValueKind::EntrySet, ctx) {
        Some(LookupValue::LazyEntrySet(set)) => Ok(set),
        _ => Err(LookupError::not_convertible(
            &ctx.describe(expr),
            ValueKind::EntrySet,
            value.kind(),
        )),
    }
}

/// The entry ids of a single entry or an entry set.
pub(super) async fn entry_ids_of(
    ctx: &EvalContext,
    expr: &LookupExpression,
    value: &LookupValue,
) -> LookupResult<Vec<EntryId>> {
    match value.as_entry() {
        Some(id) => Ok(vec![id.clone()]),
        None => entry_set_of(ctx, expr, value)?.entry_ids(ctx).await,
    }
}

pub(super) fn all_entries(ctx: &EvalContext) -> LookupValue {
    LookupValue::LazyEntrySet(LazyEntrySet::new(EntrySetQuery::all_entries(
        ctx.site_id().clone(),
    )))
}

/// Ancestors (`Outgoing`) or descendants (`Incoming`) of the entries in
/// `inner`, annotated with their minimum `distance`.
pub(super) async fn ancestors(
    ctx: &EvalContext,
    inner: &LookupExpression,
    direction: Direction,
    include_self: bool,
) -> LookupResult<LookupValue> {
    let value = inner.get_value(ctx).await?;
    let starts = entry_ids_of(ctx, inner, &value).await?;
    let reached = graph::ordered_reachable(ctx, &starts, direction, include_self).await?;

    let members = reached.into_iter().map(|reached| {
        let annotations = Annotations::from([(
            "distance".to_string(),
            LookupValue::integer(reached.distance),
        )]);
        (reached.entry_id, annotations)
    });
    Ok(LookupValue::LazyEntrySet(LazyEntrySet::from_entries(
        ctx.site_id().clone(),
        members,
    )))
}

pub(super) async fn related(
    ctx: &EvalContext,
    related: &RelatedLookup,
) -> LookupResult<LookupValue> {
    let from = related.from.get_value(ctx).await?;
    let via = match &related.via {
        Some(via) => Some(via.get_property_id(ctx).await?),
        None => None,
    };
    let direction = match &related.direction {
        Some(direction) => {
            let text = direction.get_string(ctx).await?;
            Direction::parse(&text).ok_or_else(|| {
                LookupError::evaluation(format!(
                    "\"{text}\" is not a valid direction for related(); use \"from\", \"to\" or \"both\"."
                ))
            })?
        }
        None => Direction::Both,
    };

    let set = entry_set_of(ctx, &related.from, &from)?;
    if let Some(property_id) = &via {
        let property = property::fetch_property(ctx, property_id).await?;
        if !property.kind.is_relationship() {
            return Err(LookupError::type_error(format!(
                "The property \"{}\" is not a relationship property, so it cannot be used with related().",
                property.name
            )));
        }
    }

    Ok(LookupValue::LazyEntrySet(set.then(EntrySetStage::Related {
        property: via,
        direction,
    })))
}

pub(super) async fn graph(ctx: &EvalContext, inner: &LookupExpression) -> LookupResult<LookupValue> {
    let value = inner.get_value(ctx).await?;
    let ids = entry_ids_of(ctx, inner, &value).await?;
    let graph = graph::induced_subgraph(ctx, &ids, ctx.entry_id()).await?;
    Ok(LookupValue::Graph(graph))
}
