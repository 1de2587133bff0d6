//! Lazily opened, memoized offline store.
//!
//! The store is opened on first use and shared for the lifetime of the
//! owner. Concurrent first callers coalesce onto a single open; a failed open
//! leaves the cell empty so a later caller can try again.

use super::OfflineStore;
use crate::Error;
use std::path::PathBuf;
use tokio::sync::OnceCell;

/// Where the offline store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// Single-flight handle to the offline store.
#[derive(Debug)]
pub struct LazyStore {
    location: StoreLocation,
    cell: OnceCell<OfflineStore>,
}

impl LazyStore {
    pub fn new(location: StoreLocation) -> Self {
        Self { location, cell: OnceCell::new() }
    }

    /// Wrap an already opened store.
    pub fn from_store(store: OfflineStore) -> Self {
        Self { location: StoreLocation::Memory, cell: OnceCell::new_with(Some(store)) }
    }

    /// Get the store, opening it on first call.
    ///
    /// Open and migration failures surface as `Error::StoreUnavailable`.
    pub async fn get(&self) -> Result<&OfflineStore, Error> {
        self.cell
            .get_or_try_init(|| async {
                let opened = match &self.location {
                    StoreLocation::File(path) => OfflineStore::open(path).await,
                    StoreLocation::Memory => OfflineStore::open_in_memory().await,
                };
                match opened {
                    Ok(store) => {
                        tracing::debug!(location = ?self.location, "offline store opened");
                        Ok(store)
                    }
                    Err(Error::StoreUnavailable(msg)) => Err(Error::StoreUnavailable(msg)),
                    Err(e) => Err(Error::StoreUnavailable(e.to_string())),
                }
            })
            .await
    }

    /// Whether the store has been opened.
    pub fn is_open(&self) -> bool {
        self.cell.initialized()
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }
}
