//! Named cache operations.
//!
//! A named cache is a keyed bag of stored responses. Caches are created on
//! first open, enumerated in creation order and deleted wholesale; entries
//! inside a cache are overwritten on re-put.

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A stored response, keyed by its normalized (method, URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    /// Cache key for this entry.
    pub fn key_hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

/// Raw row as read from `cache_entries`, before header decoding.
struct EntryRow {
    method: String,
    url: String,
    status_code: u16,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            method: row.get(0)?,
            url: row.get(1)?,
            status_code: row.get(2)?,
            headers_json: row.get(3)?,
            body: row.get(4)?,
            stored_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<CachedResponse, Error> {
        let headers = serde_json::from_str(&self.headers_json)?;
        Ok(CachedResponse {
            method: self.method,
            url: self.url,
            status_code: self.status_code,
            headers,
            body: self.body,
            stored_at: self.stored_at,
        })
    }
}

/// Handle to a single named cache.
#[derive(Clone, Debug)]
pub struct NamedCache {
    db: CacheDb,
    name: String,
}

impl CacheDb {
    /// Open (creating if needed) the cache called `name`.
    pub async fn open_cache(&self, name: &str) -> Result<NamedCache, Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("cache name cannot be empty".into()));
        }
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_cache(conn, &owned)?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(NamedCache { db: self.clone(), name: name.to_string() })
    }

    /// Whether a cache called `name` exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// List every cache name in creation order.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the cache called `name` with all of its entries.
    ///
    /// Returns false if no such cache existed.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries WHERE cache_name = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up across all caches, oldest cache first.
    pub async fn match_request(&self, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let key_hash = compute_cache_key(method, url);
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.method, e.url, e.status_code, e.headers_json, e.body, e.stored_at
                         FROM cache_entries e
                         INNER JOIN caches c ON c.name = e.cache_name
                         WHERE e.key_hash = ?1
                         ORDER BY c.rowid
                         LIMIT 1",
                        params![key_hash],
                        EntryRow::from_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::decode).transpose()
    }
}

impl NamedCache {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `response`, replacing any entry with the same key.
    pub async fn put(&self, response: &CachedResponse) -> Result<(), Error> {
        let name = self.name.clone();
        let key_hash = response.key_hash();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_cache(&tx, &name)?;
                tx.execute(
                    "INSERT INTO cache_entries (
                        cache_name, key_hash, method, url, status_code, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(cache_name, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status_code = excluded.status_code,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &name,
                        &key_hash,
                        &response.method,
                        &response.url,
                        response.status_code,
                        &headers_json,
                        &response.body,
                        &response.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// The (method, URL) pairs stored in this cache, sorted by URL.
    pub async fn keys(&self) -> Result<Vec<(String, String)>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt =
                    conn.prepare("SELECT method, url FROM cache_entries WHERE cache_name = ?1 ORDER BY url, method")?;
                let keys = stmt
                    .query_map(params![name], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}

fn ensure_cache(conn: &rusqlite::Connection, name: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO caches (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
