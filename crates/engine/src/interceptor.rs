//! Request interception.
//!
//! [`handle`] classifies a request and runs the matching strategy. It never
//! fails: every error inside a strategy becomes a best-effort response.

use tsync_client::{Request, Response};

use crate::context::Context;
use crate::route::Route;
use crate::{read_path, write_path};

/// Header naming where a degraded response came from.
pub const SOURCE_HEADER: &str = "x-tsync-source";

/// Minimal page served when a navigation has nothing else to show.
pub(crate) const OFFLINE_PAGE: &str = "<!doctype html>\
<html><head><meta charset=\"utf-8\"><title>Offline</title></head>\
<body><h1>You are offline</h1><p>This page is not available offline. \
Downloaded quizzes can still be opened and results will sync when you reconnect.</p></body></html>";

pub(crate) async fn handle(ctx: &Context, request: Request) -> Response {
    let route = ctx.router.classify(&request);
    tracing::debug!(method = %request.method, url = %request.url, ?route, "intercepted");

    match route {
        Route::Navigation => navigate(ctx, &request).await,
        Route::ContentRead => read_path::handle(ctx, &request).await,
        Route::ResultWrite => write_path::handle(ctx, &request).await,
        Route::Asset => asset(ctx, &request).await,
    }
}

/// Network first. Fallbacks in order: cached copy of the same request, the
/// offline document, the non-ok network response, the built-in offline page.
async fn navigate(ctx: &Context, request: &Request) -> Response {
    let received = match ctx.transport.fetch(request).await {
        Ok(response) if response.ok() => return response,
        Ok(response) => Some(response),
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "navigation fetch failed");
            None
        }
    };

    if let Some(cached) = cache_match(ctx, &request.method, request.url.as_str()).await {
        return cached;
    }

    match ctx.url(&ctx.config.offline_document) {
        Ok(document) => {
            if let Some(cached) = cache_match(ctx, "GET", document.as_str()).await {
                return cached;
            }
        }
        Err(e) => tracing::warn!(error = %e, "invalid offline document path"),
    }

    received.unwrap_or_else(|| Response::html(200, OFFLINE_PAGE))
}

/// Cache first, then network. If the network throws, serve the cached shell.
async fn asset(ctx: &Context, request: &Request) -> Response {
    if let Some(cached) = cache_match(ctx, &request.method, request.url.as_str()).await {
        return cached;
    }

    match ctx.transport.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "asset fetch failed, trying shell");
            let shell = match ctx.url(&ctx.config.shell_path) {
                Ok(url) => cache_match(ctx, "GET", url.as_str()).await,
                Err(_) => None,
            };
            shell.unwrap_or_else(Response::network_error)
        }
    }
}

/// Look up a request across all named caches. Cache errors count as a miss.
pub(crate) async fn cache_match(ctx: &Context, method: &str, url: &str) -> Option<Response> {
    match ctx.caches.match_request(method, url).await {
        Ok(Some(cached)) => {
            tracing::debug!(url, "cache hit");
            Some(Response::from(cached))
        }
        Ok(None) => {
            tracing::debug!(url, "cache miss");
            None
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "cache lookup failed");
            None
        }
    }
}
