//! Install and activation.
//!
//! Lifecycle: `Parsed -> Installed -> Activated -> Redundant`.
//!
//! - **install** pre-fetches the critical assets into the shell cache. A
//!   failing asset is logged and skipped; install still completes.
//! - **activate** deletes stale caches, opens the offline store and claims
//!   open pages, all concurrently. A store failure leaves the engine in
//!   network-only mode for the session.

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tsync_client::{CacheMode, Credentials, Request, Response};
use tsync_core::Error;

use crate::context::Context;

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installed,
    Activated,
    /// Unregistered; requests pass straight to the network.
    Redundant,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installed => "installed",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state holder.
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Parsed);
        Self { tx }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&self, next: LifecycleState) -> Result<LifecycleState, Error> {
        use LifecycleState::*;

        let current = self.state();
        let allowed = matches!(
            (current, next),
            (Parsed | Installed, Installed) | (Installed | Activated, Activated) | (_, Redundant)
        );
        if !allowed {
            return Err(Error::InvalidInput(format!("cannot move from {current} to {next}")));
        }

        self.tx.send_replace(next);
        if current != next {
            tracing::info!(from = %current, to = %next, "lifecycle transition");
        }
        Ok(current)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`install`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    /// Asset paths now in the shell cache.
    pub cached: Vec<String>,
    /// Asset paths that could not be cached, with the reason.
    pub failed: Vec<(String, String)>,
    /// Activate immediately rather than waiting for old pages to close.
    pub skip_waiting: bool,
}

/// Outcome of [`activate`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    pub deleted_caches: Vec<String>,
    /// False when the offline store could not be opened.
    pub store_ready: bool,
    pub claimed: usize,
}

pub(crate) async fn install(ctx: &Context, lifecycle: &Lifecycle) -> Result<InstallReport, Error> {
    if lifecycle.state() == LifecycleState::Redundant {
        return Err(Error::InvalidInput("cannot install after unregister".into()));
    }

    let shell = ctx.caches.open_cache(&ctx.config.shell_cache_name()).await?;

    let results = join_all(ctx.config.precache.iter().map(|path| fetch_asset(ctx, path))).await;

    let mut report = InstallReport { skip_waiting: true, ..Default::default() };
    for (path, result) in ctx.config.precache.iter().zip(results) {
        let stored = match result {
            Ok((request, response)) => shell.put(&response.to_cached(&request)).await,
            Err(e) => Err(e),
        };
        match stored {
            Ok(()) => report.cached.push(path.clone()),
            Err(e) => {
                tracing::warn!(asset = %path, error = %e, "failed to precache asset");
                report.failed.push((path.clone(), e.to_string()));
            }
        }
    }

    lifecycle.transition(LifecycleState::Installed)?;
    tracing::info!(
        cache = shell.name(),
        cached = report.cached.len(),
        failed = report.failed.len(),
        "install complete"
    );
    Ok(report)
}

pub(crate) async fn activate(ctx: &Context, lifecycle: &Lifecycle) -> Result<ActivateReport, Error> {
    if lifecycle.state() == LifecycleState::Parsed {
        return Err(Error::InvalidInput("cannot activate before install".into()));
    }

    let (deleted, store, claimed) = tokio::join!(delete_stale_caches(ctx), ctx.store.get(), ctx.clients.claim());

    let deleted_caches = deleted?;
    let store_ready = match store {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "offline store unavailable, continuing network-only");
            false
        }
    };

    lifecycle.transition(LifecycleState::Activated)?;
    tracing::info!(deleted = ?deleted_caches, store_ready, claimed, "activation complete");

    Ok(ActivateReport { deleted_caches, store_ready, claimed })
}

/// Restore the activated state left by an earlier run.
///
/// An engine whose current shell cache already exists was installed and
/// activated before; it resumes control without refetching. Returns whether
/// the engine is now activated.
pub(crate) async fn resume(ctx: &Context, lifecycle: &Lifecycle) -> Result<bool, Error> {
    match lifecycle.state() {
        LifecycleState::Activated => return Ok(true),
        LifecycleState::Redundant => return Ok(false),
        LifecycleState::Parsed | LifecycleState::Installed => {}
    }

    if !ctx.caches.has_cache(&ctx.config.shell_cache_name()).await? {
        return Ok(false);
    }

    lifecycle.transition(LifecycleState::Installed)?;
    lifecycle.transition(LifecycleState::Activated)?;
    tracing::debug!("resumed from existing shell cache");
    Ok(true)
}

/// Cache-busting fetch of one critical asset. Non-ok statuses are failures.
async fn fetch_asset(ctx: &Context, path: &str) -> Result<(Request, Response), Error> {
    let request = Request::get(ctx.url(path)?)
        .with_cache_mode(CacheMode::Reload)
        .with_credentials(Credentials::SameOrigin);
    let response = ctx.transport.fetch(&request).await?;
    if !response.ok() {
        return Err(Error::Transport(format!("status {}", response.status)));
    }
    Ok((request, response))
}

async fn delete_stale_caches(ctx: &Context) -> Result<Vec<String>, Error> {
    let current = ctx.config.current_cache_names();
    let mut deleted = Vec::new();
    for name in ctx.caches.cache_names().await? {
        if current.contains(&name) {
            continue;
        }
        if ctx.caches.delete_cache(&name).await? {
            tracing::debug!(cache = %name, "deleted stale cache");
            deleted.push(name);
        }
    }
    Ok(deleted)
}
