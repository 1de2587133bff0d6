//! Result writes.
//!
//! Online writes are forwarded verbatim. Offline writes are queued in the
//! offline store and acknowledged with `202 Accepted`; the sync coordinator
//! replays them later.

use serde_json::json;
use tsync_client::{Request, Response};
use tsync_core::Error;

use crate::context::Context;

pub(crate) async fn handle(ctx: &Context, request: &Request) -> Response {
    if !ctx.connectivity.is_online() {
        return queue(ctx, request).await;
    }

    match ctx.transport.fetch(request).await {
        Ok(response) => response,
        Err(e) if ctx.config.queue_failed_online_writes => {
            tracing::info!(error = %e, "online write failed, queueing for sync");
            queue(ctx, request).await
        }
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "online write failed");
            Response::network_error()
        }
    }
}

async fn queue(ctx: &Context, request: &Request) -> Response {
    match enqueue(ctx, request).await {
        Ok(pending_id) => {
            tracing::info!(pending_id, "result saved for sync");
            Response::json(202, &json!({ "message": "Result saved for sync", "pending_id": pending_id }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to queue result");
            Response::network_error()
        }
    }
}

async fn enqueue(ctx: &Context, request: &Request) -> Result<i64, Error> {
    let payload = request.body_json()?;
    let store = ctx.store.get().await?;
    Ok(store.enqueue_pending(&payload).await?.id)
}
