//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use crate::Error;
use crate::migrations::{self, CACHE_MIGRATIONS};
use std::path::Path;
use tokio_rusqlite::Connection;

/// Pragmas shared by every tsync database.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Response cache database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        apply_pragmas(&conn).await?;
        migrations::run(&conn, CACHE_MIGRATIONS).await?;

        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        apply_pragmas(&conn).await?;
        migrations::run(&conn, CACHE_MIGRATIONS).await?;

        Ok(Self { conn })
    }
}

/// Apply the shared pragma block to a freshly opened connection.
pub(crate) async fn apply_pragmas(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        Ok(())
    })
    .await
    .map_err(Error::Database)
}
