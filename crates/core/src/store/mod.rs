//! Structured offline store.
//!
//! A schema-versioned SQLite database holding the three record families the
//! engine serves and queues while offline:
//!
//! - `content_records`: full quiz payloads, saved by explicit download
//! - `summary_records`: lightweight quiz metadata from listings
//! - `pending_writes`: result submissions waiting for the network
//!
//! Every operation runs in its own transaction and returns only after the
//! commit, so a caller that sees `Ok` can report the write as durable.

pub mod lazy;
pub mod pending;
pub mod records;

use crate::Error;
use crate::cache::connection::apply_pragmas;
use crate::migrations::{self, STORE_MIGRATIONS};
use std::path::Path;
use tokio_rusqlite::Connection;

pub use lazy::{LazyStore, StoreLocation};
pub use pending::{PendingStatus, PendingWrite};
pub use records::{Record, RecordFamily};

/// Offline store handle.
#[derive(Clone, Debug)]
pub struct OfflineStore {
    pub(crate) conn: Connection,
}

impl OfflineStore {
    /// Open the store at `path`, creating the file and parent directory if
    /// needed and applying any pending schema migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!("failed to create store directory {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        apply_pragmas(&conn).await?;
        migrations::run(&conn, STORE_MIGRATIONS).await?;

        Ok(Self { conn })
    }

    /// Open an in-memory store for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        apply_pragmas(&conn).await?;
        migrations::run(&conn, STORE_MIGRATIONS).await?;

        Ok(Self { conn })
    }

    /// Currently applied schema version.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| -> Result<i64, Error> { migrations::current_version(conn) })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_version_is_latest() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), STORE_MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_open_unwritable_path() {
        let result = OfflineStore::open("/dev/null/tsync/offline.sqlite").await;
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    }
}
