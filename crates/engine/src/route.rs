//! Request classification.
//!
//! Every intercepted request maps to exactly one [`Route`], checked in
//! priority order: navigation, content read, result write, then asset.

use tsync_client::{Request, RequestMode};
use tsync_core::AppConfig;
use url::Url;

/// Strategy a request is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Page navigation: network first, offline document fallback.
    Navigation,
    /// `GET` under the content prefix: network, then caches, then the store.
    ContentRead,
    /// `POST` to the result endpoint: forward online, queue offline.
    ResultWrite,
    /// Anything else: cache first.
    Asset,
}

/// Pure request classifier.
#[derive(Debug, Clone)]
pub struct Router {
    content_prefix: String,
    result_endpoint: String,
}

impl Router {
    pub fn new(content_prefix: impl Into<String>, result_endpoint: impl Into<String>) -> Self {
        Self { content_prefix: content_prefix.into(), result_endpoint: result_endpoint.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.content_prefix, &config.result_endpoint)
    }

    pub fn classify(&self, request: &Request) -> Route {
        let path = request.url.path();
        if request.mode == RequestMode::Navigate {
            Route::Navigation
        } else if request.is_method("GET") && path.starts_with(&self.content_prefix) {
            Route::ContentRead
        } else if request.is_method("POST") && path.starts_with(&self.result_endpoint) {
            Route::ResultWrite
        } else {
            Route::Asset
        }
    }
}

/// Numeric entity id from the last non-empty path segment.
///
/// `/api/tests/42` and `/api/tests/42/` both yield 42; `/api/tests/` yields
/// nothing.
pub fn trailing_id(url: &Url) -> Option<i64> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?
        .parse()
        .ok()
}
