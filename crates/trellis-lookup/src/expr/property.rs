//! Property access: `get`, `reverse`, `withDetail`, `entryType`.
//!
//! Relationship properties compose a lazy query stage. Value properties
//! store a lookup expression per fact, which is parsed and evaluated in the
//! scope of the entry it belongs to.

use std::collections::HashMap;

use super::traversal::entry_set_of;
use super::{LookupExpression, PropertyLookup};
use crate::backend::{Direction, EntryRecord, PropertyFact, PropertyRecord, RelationshipFilter};
use crate::context::EvalContext;
use crate::error::{LookupError, LookupResult};
use crate::graph;
use crate::ids::{EntryId, PropertyId};
use crate::query::EntrySetStage;
use crate::syntax::parse_lookup;
use crate::value::{
    evaluate_detail, fact_annotations, Annotations, LazyEntrySet, LazyList, LookupValue,
};

pub(crate) async fn fetch_property(
    ctx: &EvalContext,
    property_id: &PropertyId,
) -> LookupResult<PropertyRecord> {
    ctx.transaction()
        .properties(ctx.site_id(), std::slice::from_ref(property_id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            LookupError::evaluation(format!(
                "The property \"{property_id}\" does not exist on this site."
            ))
        })
}

pub(crate) async fn fetch_entry(ctx: &EvalContext, entry_id: &EntryId) -> LookupResult<EntryRecord> {
    ctx.transaction()
        .entries(ctx.site_id(), std::slice::from_ref(entry_id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::evaluation(format!("The entry \"{entry_id}\" was not found.")))
}

// ============================================================================
// get()
// ============================================================================

pub(super) async fn get(ctx: &EvalContext, lookup: &PropertyLookup) -> LookupResult<LookupValue> {
    let target = lookup.target.get_value(ctx).await?;
    let property_id = lookup.prop.get_property_id(ctx).await?;
    let property = fetch_property(ctx, &property_id).await?;

    match target.as_entry() {
        Some(entry_id) => get_for_entry(ctx, entry_id, &property).await,
        None => {
            let set = entry_set_of(ctx, &lookup.target, &target)?;
            get_for_set(ctx, set, &property).await
        }
    }
}

async fn get_for_entry(
    ctx: &EvalContext,
    entry_id: &EntryId,
    property: &PropertyRecord,
) -> LookupResult<LookupValue> {
    let entry = fetch_entry(ctx, entry_id).await?;
    if !property.applies_to.contains(&entry.entry_type) {
        return Err(LookupError::type_error(format!(
            "The property \"{}\" does not apply to the entry \"{}\".",
            property.name, entry.name
        )));
    }

    if property.kind.is_relationship() {
        let source = if property.inheritable {
            inherited_relationship_source(ctx, entry_id, property).await?
        } else {
            entry_id.clone()
        };
        let set = LazyEntrySet::from_entries(ctx.site_id().clone(), [(source, Annotations::new())]);
        return Ok(LookupValue::LazyEntrySet(set.then(
            EntrySetStage::FollowProperty {
                property: property.id.clone(),
            },
        )));
    }

    let facts = ctx
        .transaction()
        .property_facts(ctx.site_id(), std::slice::from_ref(entry_id), &property.id)
        .await?;
    if facts.is_empty() && property.inheritable {
        if let Some((owner, inherited)) = inherited_value_facts(ctx, entry_id, property).await? {
            return values_from_facts(ctx, &owner, property, inherited).await;
        }
    }
    values_from_facts(ctx, entry_id, property, facts).await
}

/// Set access has no `applies_to` check: members the property does not
/// apply to have no facts and contribute nothing.
async fn get_for_set(
    ctx: &EvalContext,
    set: LazyEntrySet,
    property: &PropertyRecord,
) -> LookupResult<LookupValue> {
    if property.kind.is_relationship() {
        return Ok(LookupValue::LazyEntrySet(set.then(
            EntrySetStage::FollowProperty {
                property: property.id.clone(),
            },
        )));
    }

    let ids = set.entry_ids(ctx).await?;
    let position: HashMap<&EntryId, usize> =
        ids.iter().enumerate().map(|(index, id)| (id, index)).collect();
    let mut facts = ctx
        .transaction()
        .property_facts(ctx.site_id(), &ids, &property.id)
        .await?;
    facts.sort_by(|a, b| {
        let a_key = (position.get(&a.entry_id), a.rank.unwrap_or(i64::MAX), &a.id);
        let b_key = (position.get(&b.entry_id), b.rank.unwrap_or(i64::MAX), &b.id);
        a_key.cmp(&b_key)
    });

    let mut values = Vec::with_capacity(facts.len());
    for fact in &facts {
        let value = evaluate_stored(ctx, &fact.entry_id, property, &fact.value_expression).await?;
        let mut annotations =
            fact_annotations(fact.rank, fact.note.as_deref(), fact.slot.as_deref(), None);
        annotations.insert("entry".to_string(), LookupValue::Entry(fact.entry_id.clone()));
        values.push(value.annotate(annotations));
    }
    Ok(LookupValue::LazyList(LazyList::new(values)))
}

/// None → default or Null, one → that value, several → annotated list.
async fn values_from_facts(
    ctx: &EvalContext,
    entry_id: &EntryId,
    property: &PropertyRecord,
    mut facts: Vec<PropertyFact>,
) -> LookupResult<LookupValue> {
    facts.sort_by(|a, b| {
        (a.rank.unwrap_or(i64::MAX), &a.id).cmp(&(b.rank.unwrap_or(i64::MAX), &b.id))
    });
    match facts.as_slice() {
        [] => match &property.default_value {
            Some(default) => evaluate_stored(ctx, entry_id, property, default).await,
            None => Ok(LookupValue::Null),
        },
        [fact] => evaluate_stored(ctx, &fact.entry_id, property, &fact.value_expression).await,
        facts => {
            let mut values = Vec::with_capacity(facts.len());
            for fact in facts {
                let value =
                    evaluate_stored(ctx, &fact.entry_id, property, &fact.value_expression).await?;
                values.push(value.annotate(fact_annotations(
                    fact.rank,
                    fact.note.as_deref(),
                    fact.slot.as_deref(),
                    None,
                )));
            }
            Ok(LookupValue::LazyList(LazyList::new(values)))
        }
    }
}

/// Parses a stored expression and evaluates it in the scope of `entry_id`.
async fn evaluate_stored(
    ctx: &EvalContext,
    entry_id: &EntryId,
    property: &PropertyRecord,
    text: &str,
) -> LookupResult<LookupValue> {
    let expr = parse_lookup(text).map_err(|err| {
        LookupError::evaluation(format!(
            "The stored value of property \"{}\" could not be parsed: {err}",
            property.name
        ))
    })?;
    let entry_ctx = ctx.for_entry(entry_id)?;
    expr.get_value(&entry_ctx).await
}

/// The nearest ancestor that has value facts for `property`, with them.
async fn inherited_value_facts(
    ctx: &EvalContext,
    entry_id: &EntryId,
    property: &PropertyRecord,
) -> LookupResult<Option<(EntryId, Vec<PropertyFact>)>> {
    let ancestors = ancestor_ids(ctx, entry_id).await?;
    if ancestors.is_empty() {
        return Ok(None);
    }
    let facts = ctx
        .transaction()
        .property_facts(ctx.site_id(), &ancestors, &property.id)
        .await?;
    let nearest = ancestors
        .into_iter()
        .find(|ancestor| facts.iter().any(|fact| &fact.entry_id == ancestor));
    Ok(nearest.map(|owner| {
        let owned = facts
            .into_iter()
            .filter(|fact| fact.entry_id == owner)
            .collect();
        (owner, owned)
    }))
}

/// The entry whose relationship facts for `property` apply: the entry itself
/// when it has any, otherwise its nearest ancestor that does.
async fn inherited_relationship_source(
    ctx: &EvalContext,
    entry_id: &EntryId,
    property: &PropertyRecord,
) -> LookupResult<EntryId> {
    let mut candidates = vec![entry_id.clone()];
    candidates.extend(ancestor_ids(ctx, entry_id).await?);
    let facts = ctx
        .transaction()
        .relationships(
            ctx.site_id(),
            &candidates,
            &RelationshipFilter::Property(property.id.clone()),
            Direction::Outgoing,
        )
        .await?;
    Ok(candidates
        .into_iter()
        .find(|candidate| facts.iter().any(|fact| &fact.from_entry_id == candidate))
        .unwrap_or_else(|| entry_id.clone()))
}

async fn ancestor_ids(ctx: &EvalContext, entry_id: &EntryId) -> LookupResult<Vec<EntryId>> {
    let reached = graph::ordered_reachable(
        ctx,
        std::slice::from_ref(entry_id),
        Direction::Outgoing,
        false,
    )
    .await?;
    Ok(reached.into_iter().map(|reached| reached.entry_id).collect())
}

// ============================================================================
// reverse(), withDetail(), entryType()
// ============================================================================

pub(super) async fn reverse(ctx: &EvalContext, lookup: &PropertyLookup) -> LookupResult<LookupValue> {
    let target = lookup.target.get_value(ctx).await?;
    let property_id = lookup.prop.get_property_id(ctx).await?;
    let property = fetch_property(ctx, &property_id).await?;
    if !property.kind.is_relationship() {
        return Err(LookupError::type_error(format!(
            "The property \"{}\" is not a relationship property, so it cannot be used with reverse().",
            property.name
        )));
    }
    let set = entry_set_of(ctx, &lookup.target, &target)?;
    Ok(LookupValue::LazyEntrySet(set.then(EntrySetStage::Reverse {
        property: property_id,
    })))
}

pub(super) async fn with_detail(
    ctx: &EvalContext,
    lookup: &PropertyLookup,
) -> LookupResult<LookupValue> {
    let target = lookup.target.get_value(ctx).await?;
    let template = LookupExpression::Get(PropertyLookup {
        target: Box::new(LookupExpression::Placeholder("entry".to_string())),
        prop: lookup.prop.clone(),
    });

    if let Some(entry_id) = target.as_entry() {
        let detail = evaluate_detail(ctx, &template, entry_id).await?;
        return Ok(target
            .clone()
            .annotate(Annotations::from([("detail".to_string(), detail)])));
    }
    let set = entry_set_of(ctx, &lookup.target, &target)?;
    Ok(LookupValue::LazyEntrySet(set.with_detail(template)))
}

pub(super) async fn entry_type_of(
    ctx: &EvalContext,
    inner: &LookupExpression,
) -> LookupResult<LookupValue> {
    let entry_id = inner.get_entry_id(ctx).await?;
    let entry = fetch_entry(ctx, &entry_id).await?;
    Ok(LookupValue::EntryType(entry.entry_type))
}
