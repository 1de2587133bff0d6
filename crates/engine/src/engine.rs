//! Engine facade.
//!
//! Owns the caches, the lazily opened offline store and the injected
//! collaborators, and exposes the lifecycle, interception, sync,
//! maintenance and offline-library operations.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tsync_client::{Connectivity, Request, Response, Transport};
use tsync_core::{AppConfig, CacheDb, Error, LazyStore, PendingWrite, Record, RecordFamily, StoreLocation};
use url::Url;

use crate::clients::ClientHost;
use crate::context::Context;
use crate::lifecycle::{self, ActivateReport, InstallReport, Lifecycle, LifecycleState};
use crate::route::Router;
use crate::sync::{SyncCoordinator, SyncReport, SyncScheduler, SyncTags};
use crate::{interceptor, library, maintenance};

/// Collaborators the host supplies.
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub connectivity: Arc<dyn Connectivity>,
    pub clients: Arc<dyn ClientHost>,
}

/// The offline-first sync engine.
pub struct Engine {
    ctx: Arc<Context>,
    lifecycle: Lifecycle,
    coordinator: Arc<SyncCoordinator>,
    scheduler: Arc<SyncScheduler>,
}

impl Engine {
    /// Build an engine over already opened caches and a store handle.
    ///
    /// The configured sync tag is registered immediately.
    pub fn new(config: AppConfig, caches: CacheDb, store: LazyStore, collaborators: Collaborators) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let router = Router::from_config(&config);
        let tag = config.sync_tag.clone();

        let ctx = Arc::new(Context {
            config,
            origin,
            router,
            caches,
            store,
            transport: collaborators.transport,
            connectivity: collaborators.connectivity,
            clients: collaborators.clients,
        });
        let tags = SyncTags::new([tag]);
        let coordinator = Arc::new(SyncCoordinator::new(Arc::clone(&ctx), tags.clone()));
        let scheduler = Arc::new(SyncScheduler::new(coordinator.clone(), tags));

        Ok(Self { ctx, lifecycle: Lifecycle::new(), coordinator, scheduler })
    }

    /// Open the cache database at `config.cache_path` and defer the store
    /// at `config.store_path` until first use.
    pub async fn open(config: AppConfig, collaborators: Collaborators) -> Result<Self, Error> {
        let caches = CacheDb::open(&config.cache_path).await?;
        let store = LazyStore::new(StoreLocation::File(config.store_path.clone()));
        Self::new(config, caches, store, collaborators)
    }

    pub fn config(&self) -> &AppConfig {
        &self.ctx.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Resolve a path against the configured origin.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        self.ctx.url(path)
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        lifecycle::install(&self.ctx, &self.lifecycle).await
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        lifecycle::activate(&self.ctx, &self.lifecycle).await
    }

    /// Pick up where a previous run left off. See [`lifecycle::resume`].
    pub async fn resume(&self) -> Result<bool, Error> {
        lifecycle::resume(&self.ctx, &self.lifecycle).await
    }

    /// Answer an intercepted request. Never fails.
    ///
    /// Until activation, and after unregister, requests go straight to the
    /// network.
    pub async fn handle(&self, request: Request) -> Response {
        if self.lifecycle.state() != LifecycleState::Activated {
            return self.ctx.fetch_or_error(&request).await;
        }
        interceptor::handle(&self.ctx, request).await
    }

    /// Replay queued writes for `tag` directly.
    pub async fn sync(&self, tag: &str) -> Result<SyncReport, Error> {
        self.coordinator.sync(tag).await
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    /// Replay queued writes whenever `online` flips from false to true.
    pub fn watch_connectivity(&self, online: watch::Receiver<bool>) -> JoinHandle<()> {
        self.scheduler.watch_connectivity(online)
    }

    pub async fn download_for_offline(&self, id: i64) -> Result<Record, Error> {
        library::download_for_offline(&self.ctx, id).await
    }

    pub async fn refresh_summaries(&self) -> Result<usize, Error> {
        library::refresh_summaries(&self.ctx).await
    }

    pub async fn remove_offline(&self, id: i64) -> Result<bool, Error> {
        library::remove_offline(&self.ctx, id).await
    }

    pub async fn list_downloads(&self) -> Result<Vec<Record>, Error> {
        library::list_records(&self.ctx, RecordFamily::Content).await
    }

    pub async fn list_summaries(&self) -> Result<Vec<Record>, Error> {
        library::list_records(&self.ctx, RecordFamily::Summary).await
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingWrite>, Error> {
        library::list_pending(&self.ctx).await
    }

    pub async fn unregister_and_reload(&self) -> Result<usize, Error> {
        maintenance::unregister_and_reload(&self.ctx, &self.lifecycle).await
    }

    pub async fn clear_caches(&self) -> Result<Vec<String>, Error> {
        maintenance::clear_caches(&self.ctx).await
    }

    /// Cache database handle, for inspection.
    pub fn caches(&self) -> &CacheDb {
        &self.ctx.caches
    }

    /// Offline store handle, for inspection.
    pub fn store(&self) -> &LazyStore {
        &self.ctx.store
    }
}
