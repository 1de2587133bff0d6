//! Database schema migrations.
//!
//! Uses a simple version table approach to track applied migrations.
//! Each database (response caches, offline store) carries its own list and
//! its own `_migrations` table, so the two schemas version independently.

use std::num::ParseIntError;

use crate::Error;
use tokio_rusqlite::{Connection, params};

/// Migration list entry: (version, SQL).
pub(crate) type Migration = (&'static str, &'static str);

/// Migrations for the named response caches.
pub(crate) const CACHE_MIGRATIONS: &[Migration] =
    &[("1", include_str!("../migrations/cache/001_named_caches.sql"))];

/// Migrations for the structured offline store.
pub(crate) const STORE_MIGRATIONS: &[Migration] = &[
    ("1", include_str!("../migrations/store/001_offline_store.sql")),
    ("2", include_str!("../migrations/store/002_pending_attempts.sql")),
];

/// Run any pending migrations from `migrations`.
///
/// This creates the _migrations table if it doesn't exist, checks the
/// current version, and applies any migrations that haven't been run yet.
/// Each migration and its version row commit in one transaction.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub(crate) async fn run(conn: &Connection, migrations: &'static [Migration]) -> Result<(), Error> {
    conn.call(move |conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(Error::from)?;

        let current = current_version(conn)?;

        for (version, sql) in migrations {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
            if version_num > current {
                let tx = conn.transaction()?;
                tx.execute_batch(sql)
                    .map_err(|e| Error::MigrationFailed(format!("version {version_num}: {e}")))?;
                tx.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version_num, chrono::Utc::now().to_rfc3339()],
                )?;
                tx.commit()?;
                tracing::debug!(version = version_num, "applied migration");
            }
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Highest applied migration version, 0 for a fresh database.
pub(crate) fn current_version(conn: &tokio_rusqlite::rusqlite::Connection) -> Result<i64, Error> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))
        .map_err(Error::from)
}
