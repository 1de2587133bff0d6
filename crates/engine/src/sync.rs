//! Pending-write replay.
//!
//! [`SyncCoordinator`] drains the pending queue against the result endpoint
//! when a registered sync tag fires. Delivery is at-least-once: a record is
//! deleted only after the server answers ok, so a failure anywhere leaves
//! it queued for the next trigger.
//!
//! [`SyncScheduler`] stands in for the host's background-sync facility. It
//! fires registered tags either on demand or on every offline-to-online
//! transition of a connectivity channel. The scheduler and the coordinator
//! share one [`SyncTags`] set.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tsync_client::{Credentials, Request};
use tsync_core::{Error, PendingWrite};

use crate::context::Context;

/// Registered sync tags, shared between the scheduler and the coordinator.
#[derive(Debug, Clone, Default)]
pub struct SyncTags(Arc<RwLock<BTreeSet<String>>>);

impl SyncTags {
    pub fn new(tags: impl IntoIterator<Item = String>) -> Self {
        Self(Arc::new(RwLock::new(tags.into_iter().collect())))
    }

    /// Returns false if the tag was already registered.
    pub async fn register(&self, tag: &str) -> bool {
        self.0.write().await.insert(tag.to_string())
    }

    pub async fn unregister(&self, tag: &str) -> bool {
        self.0.write().await.remove(tag)
    }

    pub async fn contains(&self, tag: &str) -> bool {
        self.0.read().await.contains(tag)
    }

    /// Sorted.
    pub async fn list(&self) -> Vec<String> {
        self.0.read().await.iter().cloned().collect()
    }
}

/// Writes selected for replay under a tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayPlan {
    pub tag: String,
    /// Oldest first.
    pub writes: Vec<PendingWrite>,
}

/// Decide what to replay. Unregistered tags replay nothing.
pub fn plan_replay(tag: &str, registered: &[String], mut writes: Vec<PendingWrite>) -> Option<ReplayPlan> {
    if !registered.iter().any(|t| t == tag) {
        return None;
    }
    writes.sort_by_key(|w| w.id);
    Some(ReplayPlan { tag: tag.to_string(), writes })
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub tag: String,
    /// Ids delivered and removed from the queue.
    pub replayed: Vec<i64>,
    /// Ids left queued, with the failure.
    pub failed: Vec<(i64, String)>,
    /// Ids the server accepted but that were already gone from the queue.
    pub already_handled: Vec<i64>,
    /// True when the tag was not registered and nothing ran.
    pub skipped: bool,
}

impl SyncReport {
    fn skipped(tag: &str) -> Self {
        Self { tag: tag.to_string(), skipped: true, ..Default::default() }
    }
}

/// Something that runs when a sync tag fires.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn on_sync(&self, tag: &str) -> Result<SyncReport, Error>;
}

/// Replays queued result writes.
///
/// Runs are serialized: a second `sync` waits for the one in flight and
/// then reads the queue afresh, so a record is posted at most once per
/// successful delivery.
pub struct SyncCoordinator {
    ctx: Arc<Context>,
    tags: SyncTags,
    run_lock: Mutex<()>,
}

enum Delivery {
    Replayed,
    AlreadyHandled,
}

impl SyncCoordinator {
    pub(crate) fn new(ctx: Arc<Context>, tags: SyncTags) -> Self {
        Self { ctx, tags, run_lock: Mutex::new(()) }
    }

    /// Replay every queued write for `tag`.
    ///
    /// Fails only when the queue cannot be read; per-record failures are
    /// reported in the [`SyncReport`].
    pub async fn sync(&self, tag: &str) -> Result<SyncReport, Error> {
        let _running = self.run_lock.lock().await;
        let ctx = &self.ctx;
        let store = ctx.store.get().await?;
        let registered = self.tags.list().await;

        let Some(plan) = plan_replay(tag, &registered, store.pending_writes().await?) else {
            tracing::debug!(tag, "ignoring unregistered sync tag");
            return Ok(SyncReport::skipped(tag));
        };

        let endpoint = ctx.url(&ctx.config.result_endpoint)?;
        let mut report = SyncReport { tag: plan.tag.clone(), ..Default::default() };

        for write in &plan.writes {
            let request = Request::post_json(endpoint.clone(), &write.payload).with_credentials(Credentials::Include);
            let outcome = match ctx.transport.fetch(&request).await {
                Ok(response) if response.ok() => store.delete_pending(write.id).await.map(|deleted| {
                    if deleted { Delivery::Replayed } else { Delivery::AlreadyHandled }
                }),
                Ok(response) => Err(Error::ReplayFailed { id: write.id, reason: format!("status {}", response.status) }),
                Err(e) => Err(Error::ReplayFailed { id: write.id, reason: e.to_string() }),
            };

            match outcome {
                Ok(Delivery::Replayed) => {
                    tracing::debug!(id = write.id, "replayed pending write");
                    report.replayed.push(write.id);
                }
                Ok(Delivery::AlreadyHandled) => {
                    tracing::debug!(id = write.id, "pending write already removed");
                    report.already_handled.push(write.id);
                }
                Err(e) => {
                    tracing::warn!(id = write.id, attempts = write.attempts + 1, error = %e, "replay failed, keeping record");
                    if let Err(bump) = store.record_failed_attempt(write.id, &e.to_string()).await {
                        tracing::warn!(id = write.id, error = %bump, "failed to record replay attempt");
                    }
                    report.failed.push((write.id, e.to_string()));
                }
            }
        }

        tracing::info!(
            tag,
            replayed = report.replayed.len(),
            failed = report.failed.len(),
            already_handled = report.already_handled.len(),
            "sync complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl SyncHandler for SyncCoordinator {
    async fn on_sync(&self, tag: &str) -> Result<SyncReport, Error> {
        self.sync(tag).await
    }
}

/// Injected background-sync trigger.
pub struct SyncScheduler {
    tags: SyncTags,
    handler: Arc<dyn SyncHandler>,
}

impl SyncScheduler {
    pub fn new(handler: Arc<dyn SyncHandler>, tags: SyncTags) -> Self {
        Self { tags, handler }
    }

    /// Register a tag. Returns false if it was already registered.
    pub async fn register(&self, tag: &str) -> bool {
        self.tags.register(tag).await
    }

    pub async fn unregister(&self, tag: &str) -> bool {
        self.tags.unregister(tag).await
    }

    pub async fn registered(&self) -> Vec<String> {
        self.tags.list().await
    }

    /// Fire `tag` now. Unregistered tags are ignored.
    pub async fn fire(&self, tag: &str) -> Result<SyncReport, Error> {
        if !self.tags.contains(tag).await {
            tracing::debug!(tag, "sync tag not registered");
            return Ok(SyncReport::skipped(tag));
        }
        self.handler.on_sync(tag).await
    }

    /// Fire every registered tag on each offline-to-online transition.
    pub fn watch_connectivity(self: &Arc<Self>, mut online: watch::Receiver<bool>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            while online.changed().await.is_ok() {
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    for tag in scheduler.registered().await {
                        if let Err(e) = scheduler.fire(&tag).await {
                            tracing::warn!(tag = %tag, error = %e, "background sync failed");
                        }
                    }
                }
                was_online = now_online;
            }
        })
    }
}
