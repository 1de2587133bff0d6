//! Content reads.
//!
//! Online, the network answers and ok responses are copied into the API
//! cache. Offline, or when the network throws, the first hit wins:
//!
//! 1. an exact cached response
//! 2. the content record for the trailing id, then the summary record
//! 3. a network-error response

use tsync_client::{Request, Response};
use tsync_core::RecordFamily;

use crate::context::Context;
use crate::interceptor::{SOURCE_HEADER, cache_match};
use crate::route::trailing_id;

pub(crate) async fn handle(ctx: &Context, request: &Request) -> Response {
    if ctx.connectivity.is_online() {
        match ctx.transport.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    store_in_api_cache(ctx, request, &response).await;
                }
                return response;
            }
            Err(e) if e.is_transport() => {
                tracing::debug!(url = %request.url, error = %e, "content fetch failed, serving offline")
            }
            Err(e) => tracing::warn!(url = %request.url, error = %e, "content fetch errored, serving offline"),
        }
    }

    serve_offline(ctx, request).await
}

async fn store_in_api_cache(ctx: &Context, request: &Request, response: &Response) {
    let result = async {
        let cache = ctx.caches.open_cache(&ctx.config.api_cache_name()).await?;
        cache.put(&response.to_cached(request)).await
    }
    .await;
    if let Err(e) = result {
        tracing::warn!(url = %request.url, error = %e, "failed to cache content response");
    }
}

async fn serve_offline(ctx: &Context, request: &Request) -> Response {
    if let Some(cached) = cache_match(ctx, &request.method, request.url.as_str()).await {
        return cached.with_header(SOURCE_HEADER, "cache");
    }

    let Some(id) = trailing_id(&request.url) else {
        return Response::network_error();
    };

    let store = match ctx.store.get().await {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %e, "offline store unavailable for read");
            return Response::network_error();
        }
    };

    match store.find_quiz(id).await {
        Ok(Some((family, record))) => {
            tracing::debug!(id, %family, "served from offline store");
            let source = match family {
                RecordFamily::Content => "content",
                RecordFamily::Summary => "summary",
            };
            Response::json(200, &record.to_value()).with_header(SOURCE_HEADER, source)
        }
        Ok(None) => {
            tracing::debug!(id, "quiz not available offline");
            Response::network_error()
        }
        Err(e) => {
            tracing::warn!(id, error = %e, "offline store read failed");
            Response::network_error()
        }
    }
}
