//! Lists and sequence operations: `[...]`, `count`, `first`, `slice`.

use num_bigint::{BigInt, Sign};
use unicode_segmentation::UnicodeSegmentation;

use super::{LookupExpression, SliceLookup};
use crate::context::EvalContext;
use crate::error::{LookupError, LookupResult};
use crate::query::Window;
use crate::value::{LazyList, LookupValue, PageValue};

/// Items are evaluated in order but never forced; lazy items stay lazy.
pub(super) async fn list(ctx: &EvalContext, items: &[LookupExpression]) -> LookupResult<LookupValue> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        values.push(item.get_value(ctx).await?);
    }
    Ok(LookupValue::LazyList(LazyList::new(values)))
}

pub(super) async fn count(ctx: &EvalContext, inner: &LookupExpression) -> LookupResult<LookupValue> {
    let value = inner.get_value(ctx).await?;
    match value.count(ctx).await? {
        Some(total) => Ok(LookupValue::integer(total)),
        None => Err(LookupError::not_countable(&ctx.describe(inner), "count")),
    }
}

/// The first item of a sequence, or the first grapheme of a string.
pub(super) async fn first(ctx: &EvalContext, inner: &LookupExpression) -> LookupResult<LookupValue> {
    let value = inner.get_value(ctx).await?;
    if let LookupValue::String(text) = value.unannotated() {
        return Ok(text
            .graphemes(true)
            .next()
            .map(LookupValue::string)
            .unwrap_or(LookupValue::Null));
    }
    match value.fetch(ctx, Window::first(1)).await? {
        Some(items) => Ok(items.into_iter().next().unwrap_or(LookupValue::Null)),
        None => Err(LookupError::unsupported_operation(&ctx.describe(inner), "first")),
    }
}

// ============================================================================
// slice()
// ============================================================================

/// Resolves slice bounds against a sequence of `total` items and returns
/// `(start, length)`.
///
/// Negative indices count from the end. Both bounds are clamped into
/// `[0, total]`; `size` can only shrink the window; an end before the start
/// gives an empty window.
pub fn resolve_slice(
    total: u64,
    start: Option<i64>,
    end: Option<i64>,
    size: Option<i64>,
) -> (u64, u64) {
    let total = i128::from(total);
    let resolve = |index: i64| {
        let index = i128::from(index);
        let index = if index < 0 { total + index } else { index };
        index.clamp(0, total)
    };
    let start = start.map(resolve).unwrap_or(0);
    let mut end = end.map(resolve).unwrap_or(total);
    if let Some(size) = size {
        end = end.min(start + i128::from(size.max(0)));
    }
    let end = end.max(start);
    // Both values lie in [0, total], which came from a u64.
    (start as u64, (end - start) as u64)
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    start: Option<i64>,
    end: Option<i64>,
    size: Option<i64>,
}

pub(super) async fn slice(ctx: &EvalContext, slice: &SliceLookup) -> LookupResult<LookupValue> {
    let value = slice.iterable.get_value(ctx).await?;
    let bounds = Bounds {
        start: optional_index(ctx, slice.start.as_deref()).await?,
        end: optional_index(ctx, slice.end.as_deref()).await?,
        size: optional_index(ctx, slice.size.as_deref()).await?,
    };

    let describe = ctx.describe(&slice.iterable);
    if !value.is_iterable() {
        return Err(LookupError::not_iterable(&describe, "slice"));
    }
    if !value.is_countable() {
        return Err(LookupError::not_countable(&describe, "slice"));
    }

    let value = match value.unannotated() {
        LookupValue::Page(page) if page.is_complete() => return Ok(slice_complete_page(page, bounds)),
        LookupValue::Page(page) => match &page.source {
            Some(source) => {
                let source_ctx = match &source.entry_id {
                    Some(entry_id) => ctx.clone().with_entry(entry_id.clone()),
                    None => ctx.clone(),
                };
                let fresh = source.expression.get_value(&source_ctx).await?;
                if matches!(fresh.unannotated(), LookupValue::Page(_)) {
                    return Err(LookupError::evaluation(format!(
                        "The page produced by \"{describe}\" cannot be sliced again."
                    )));
                }
                fresh
            }
            None => {
                return Err(LookupError::evaluation(format!(
                    "The page produced by \"{describe}\" is incomplete and cannot be sliced."
                )))
            }
        },
        _ => value,
    };

    let total = value
        .count(ctx)
        .await?
        .ok_or_else(|| LookupError::not_countable(&describe, "slice"))?;
    let (start, length) = resolve_slice(total, bounds.start, bounds.end, bounds.size);
    let values = if length == 0 {
        Vec::new()
    } else {
        value
            .fetch(ctx, Window::new(start, length))
            .await?
            .ok_or_else(|| LookupError::not_iterable(&describe, "slice"))?
    };
    Ok(LookupValue::Page(PageValue::new(values, start, length, total)))
}

fn slice_complete_page(page: &PageValue, bounds: Bounds) -> LookupValue {
    let (start, length) = resolve_slice(page.total_count, bounds.start, bounds.end, bounds.size);
    let values = Window::new(start, length).apply(page.values.iter().cloned());
    LookupValue::Page(PageValue::new(values, start, length, page.total_count))
}

async fn optional_index(
    ctx: &EvalContext,
    expr: Option<&LookupExpression>,
) -> LookupResult<Option<i64>> {
    match expr {
        Some(expr) => Ok(Some(saturating_i64(&expr.get_integer(ctx).await?))),
        None => Ok(None),
    }
}

fn saturating_i64(value: &BigInt) -> i64 {
    i64::try_from(value).unwrap_or(if value.sign() == Sign::Minus {
        i64::MIN
    } else {
        i64::MAX
    })
}
