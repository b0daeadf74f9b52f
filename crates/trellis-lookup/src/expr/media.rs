//! Entry features: `image()` and `files()`.

use super::traversal::entry_set_of;
use super::LookupExpression;
use crate::backend::{BackendError, FileRecord};
use crate::context::EvalContext;
use crate::error::{LookupError, LookupResult};
use crate::ids::EntryId;
use crate::query::{RowQuery, Window};
use crate::value::{FileValue, ImageValue, LazyRows, LookupValue};

/// The image of an entry, or of the first entry of a set. Null when the
/// entry has no image or the set is empty.
pub(super) async fn image(ctx: &EvalContext, inner: &LookupExpression) -> LookupResult<LookupValue> {
    let value = inner.get_value(ctx).await?;
    let entry_id = match value.as_entry() {
        Some(entry_id) => entry_id.clone(),
        None => {
            let set = entry_set_of(ctx, inner, &value)?;
            let first = set.fetch(ctx, Window::first(1)).await?;
            match first.first().and_then(LookupValue::as_entry) {
                Some(entry_id) => entry_id.clone(),
                None => return Ok(LookupValue::Null),
            }
        }
    };
    image_of(ctx, entry_id).await
}

async fn image_of(ctx: &EvalContext, entry_id: EntryId) -> LookupResult<LookupValue> {
    let features = ctx
        .transaction()
        .image_features(ctx.site_id(), std::slice::from_ref(&entry_id))
        .await?;
    let Some(feature) = features.into_iter().find(|feature| feature.entry_id == entry_id) else {
        return Ok(LookupValue::Null);
    };
    Ok(LookupValue::Image(Box::new(ImageValue {
        entry_id: feature.entry_id,
        alt_text: feature.alt_text,
        image_url: feature.image_url,
        content_type: feature.content_type,
        size: feature.size,
        width: feature.width,
        height: feature.height,
        blur_hash: feature.blur_hash,
        border_color: feature.border_color,
        caption: feature.caption,
    })))
}

/// Data files attached to the entries, as a lazy row iterable.
pub(super) async fn files(ctx: &EvalContext, inner: &LookupExpression) -> LookupResult<LookupValue> {
    let value = inner.get_value(ctx).await?;
    let set = entry_set_of(ctx, inner, &value)?;
    Ok(LookupValue::LazyRows(LazyRows::new(
        RowQuery::Files {
            entries: set.query().clone(),
        },
        file_from_row,
    )))
}

fn file_from_row(row: &serde_json::Value) -> LookupResult<LookupValue> {
    let record: FileRecord = serde_json::from_value(row.clone())
        .map_err(|err| LookupError::Backend(BackendError::from(err)))?;
    Ok(LookupValue::File(FileValue {
        filename: record.filename,
        url: record.url,
        content_type: record.content_type,
        size: record.size,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_rows_decode_to_file_values() {
        let row = json!({
            "entryId": "_a",
            "filename": "data.csv",
            "url": "https://files.example/data.csv",
            "contentType": "text/csv",
            "size": 1024
        });
        let value = file_from_row(&row).unwrap();
        assert_eq!(
            value,
            LookupValue::File(FileValue {
                filename: "data.csv".to_string(),
                url: "https://files.example/data.csv".to_string(),
                content_type: "text/csv".to_string(),
                size: 1024,
            })
        );
    }

    #[test]
    fn malformed_file_rows_are_backend_errors() {
        let err = file_from_row(&json!({"filename": 3})).unwrap_err();
        assert_eq!(err.class(), "BackendError");
    }
}
