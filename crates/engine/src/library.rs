//! Offline library management.
//!
//! Explicit user actions that fill and prune the offline store: downloading
//! a full quiz, refreshing the summary listing and removing downloads.

use serde_json::Value;
use tsync_client::{Credentials, Request, Response};
use tsync_core::{Error, PendingWrite, Record, RecordFamily};

use crate::context::Context;

async fn get_json(ctx: &Context, path: &str) -> Result<Value, Error> {
    let request = Request::get(ctx.url(path)?).with_credentials(Credentials::Include);
    let response: Response = ctx.transport.fetch(&request).await?;
    if !response.ok() {
        return Err(Error::Transport(format!("GET {} returned status {}", request.url, response.status)));
    }
    response.body_json()
}

/// Fetch quiz `id` and save it as a content record, then read it back.
pub(crate) async fn download_for_offline(ctx: &Context, id: i64) -> Result<Record, Error> {
    let path = format!("{}{id}/", ctx.config.content_prefix);
    let Value::Object(fields) = get_json(ctx, &path).await? else {
        return Err(Error::MalformedPayload(format!("quiz {id} is not a JSON object")));
    };

    let store = ctx.store.get().await?;
    store.put_record(RecordFamily::Content, &Record::new(id, fields)).await?;

    let saved = store
        .get_record(RecordFamily::Content, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("quiz {id} missing after save")))?;

    tracing::info!(id, "quiz downloaded for offline use");
    Ok(saved)
}

/// Refresh summary records from the quiz listing. Returns the number saved.
///
/// The listing may be a bare array or a paginated object with `results`.
pub(crate) async fn refresh_summaries(ctx: &Context) -> Result<usize, Error> {
    let listing = get_json(ctx, &ctx.config.content_prefix).await?;
    let items = match listing {
        Value::Array(items) => items,
        Value::Object(mut page) => match page.remove("results") {
            Some(Value::Array(items)) => items,
            _ => return Err(Error::MalformedPayload("quiz listing has no results array".into())),
        },
        _ => return Err(Error::MalformedPayload("quiz listing is not an array or page".into())),
    };

    let records: Vec<Record> = items
        .into_iter()
        .filter_map(|item| match Record::from_document(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "skipping listing entry");
                None
            }
        })
        .collect();

    let store = ctx.store.get().await?;
    let saved = store.put_records(RecordFamily::Summary, &records).await?;
    tracing::info!(saved, "summaries refreshed");
    Ok(saved)
}

/// Delete a downloaded quiz. Returns false if it was not downloaded.
pub(crate) async fn remove_offline(ctx: &Context, id: i64) -> Result<bool, Error> {
    ctx.store.get().await?.delete_record(RecordFamily::Content, id).await
}

pub(crate) async fn list_records(ctx: &Context, family: RecordFamily) -> Result<Vec<Record>, Error> {
    ctx.store.get().await?.list_records(family).await
}

pub(crate) async fn list_pending(ctx: &Context) -> Result<Vec<PendingWrite>, Error> {
    ctx.store.get().await?.pending_writes().await
}
