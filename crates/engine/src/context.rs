//! Shared collaborators handed to every strategy.

use std::sync::Arc;

use tsync_client::{Connectivity, Request, Response, Transport, resolve};
use tsync_core::{AppConfig, CacheDb, Error, LazyStore};
use url::Url;

use crate::clients::ClientHost;
use crate::route::Router;

pub(crate) struct Context {
    pub(crate) config: AppConfig,
    pub(crate) origin: Url,
    pub(crate) router: Router,
    pub(crate) caches: CacheDb,
    pub(crate) store: LazyStore,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) connectivity: Arc<dyn Connectivity>,
    pub(crate) clients: Arc<dyn ClientHost>,
}

impl Context {
    /// Resolve a configured path against the origin.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(resolve(&self.origin, path)?)
    }

    /// Fetch, turning a thrown failure into a network-error response.
    pub(crate) async fn fetch_or_error(&self, request: &Request) -> Response {
        match self.transport.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "network request failed");
                Response::network_error()
            }
        }
    }
}
