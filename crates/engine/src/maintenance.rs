//! Unregister and cache clearing.

use tsync_core::Error;

use crate::context::Context;
use crate::lifecycle::{Lifecycle, LifecycleState};

/// Retire the engine and reload every page so it fetches from the network.
///
/// The current shell cache is dropped so a restarted engine does not
/// resume as activated. Returns the number of pages reloaded.
pub(crate) async fn unregister_and_reload(ctx: &Context, lifecycle: &Lifecycle) -> Result<usize, Error> {
    lifecycle.transition(LifecycleState::Redundant)?;
    let shell = ctx.config.shell_cache_name();
    if ctx.caches.delete_cache(&shell).await? {
        tracing::debug!(cache = %shell, "dropped shell cache");
    }
    ctx.clients.release().await;
    let reloaded = ctx.clients.reload_all().await;
    tracing::info!(reloaded, "unregistered");
    Ok(reloaded)
}

/// Delete every named cache. Returns the deleted names.
pub(crate) async fn clear_caches(ctx: &Context) -> Result<Vec<String>, Error> {
    let mut deleted = Vec::new();
    for name in ctx.caches.cache_names().await? {
        if ctx.caches.delete_cache(&name).await? {
            deleted.push(name);
        }
    }
    tracing::info!(deleted = ?deleted, "caches cleared");
    Ok(deleted)
}
