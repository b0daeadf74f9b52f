//! `this`, entry references, `if`, `date` and `markdown`.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use super::{Conditional, LookupExpression};
use crate::context::EvalContext;
use crate::error::{LookupError, LookupResult};
use crate::ids::{is_entry_id, is_friendly_id, EntryId};
use crate::value::{LookupValue, ValueKind};

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid ISO date regex"));

static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid compact date regex"));

pub(super) fn this(ctx: &EvalContext) -> LookupResult<LookupValue> {
    ctx.entry_id()
        .map(|id| LookupValue::Entry(id.clone()))
        .ok_or_else(|| {
            LookupError::scope("The keyword \"this\" only works in the context of a specific entry.")
        })
}

/// Resolves `[[/entry/key]]`. Ids are taken as-is; friendly ids are looked up.
pub(super) async fn entry_ref(ctx: &EvalContext, key: &str) -> LookupResult<LookupValue> {
    if is_entry_id(key) {
        return Ok(LookupValue::Entry(EntryId::new(key)));
    }
    if is_friendly_id(key) {
        let found = ctx
            .transaction()
            .entries_by_friendly_id(ctx.site_id(), &[key.to_string()])
            .await?;
        if let Some(record) = found.into_iter().next() {
            return Ok(LookupValue::Entry(record.id));
        }
    }
    Err(LookupError::evaluation(format!(
        "The entry \"{key}\" was not found."
    )))
}

pub(super) async fn conditional(
    ctx: &EvalContext,
    conditional: &Conditional,
) -> LookupResult<LookupValue> {
    let condition = conditional.condition.get_value(ctx).await?;
    if condition.is_truthy(ctx).await? {
        match &conditional.then {
            Some(then) => then.get_value(ctx).await,
            None => Ok(condition),
        }
    } else {
        match &conditional.otherwise {
            Some(otherwise) => otherwise.get_value(ctx).await,
            None => Ok(LookupValue::Null),
        }
    }
}

pub(super) async fn date(ctx: &EvalContext, inner: &LookupExpression) -> LookupResult<LookupValue> {
    let text = inner.get_string(ctx).await?;
    parse_date(&text).map(LookupValue::Date).ok_or_else(|| {
        LookupError::evaluation(format!(
            "\"{text}\" is not a valid date. Dates must be in the format YYYY-MM-DD."
        ))
    })
}

pub(super) async fn markdown(
    ctx: &EvalContext,
    inner: &LookupExpression,
) -> LookupResult<LookupValue> {
    inner.get_value_as(ctx, ValueKind::InlineMarkdown).await
}

/// `YYYY-MM-DD` or `YYYYMMDD`, calendar-validated.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let captures = ISO_DATE
        .captures(text)
        .or_else(|| COMPACT_DATE.captures(text))?;
    let year = captures[1].parse().ok()?;
    let month = captures[2].parse().ok()?;
    let day = captures[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
