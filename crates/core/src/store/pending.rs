//! Pending write queue.
//!
//! Result submissions made while offline are queued here and drained by the
//! sync coordinator. Ids are millisecond timestamps bumped past the current
//! maximum, so they are unique and replay in submission order.

use super::OfflineStore;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tokio_rusqlite::params;

/// Queue status of a pending write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
}

impl PendingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PendingStatus::Pending => "pending",
        }
    }
}

impl FromStr for PendingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PendingStatus::Pending),
            other => Err(Error::MalformedPayload(format!("unknown pending status: {other}"))),
        }
    }
}

/// A queued write awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub id: i64,
    pub payload: Value,
    pub status: PendingStatus,
    pub created_at: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl OfflineStore {
    /// Queue a write payload.
    ///
    /// The id is allocated inside the insert transaction, so concurrent
    /// enqueues can never collide.
    pub async fn enqueue_pending(&self, payload: &Value) -> Result<PendingWrite, Error> {
        let payload_json = serde_json::to_string(payload)?;
        let payload = payload.clone();
        self.conn
            .call(move |conn| -> Result<PendingWrite, Error> {
                let tx = conn.transaction()?;
                let now = chrono::Utc::now();
                let max_id: i64 = tx.query_row("SELECT COALESCE(MAX(id), 0) FROM pending_writes", [], |row| row.get(0))?;
                let id = now.timestamp_millis().max(max_id + 1);
                let created_at = now.to_rfc3339();

                tx.execute(
                    "INSERT INTO pending_writes (id, payload, status, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![id, payload_json, PendingStatus::Pending.as_str(), created_at],
                )?;
                tx.commit()?;

                Ok(PendingWrite {
                    id,
                    payload,
                    status: PendingStatus::Pending,
                    created_at,
                    attempts: 0,
                    last_error: None,
                })
            })
            .await
            .map_err(Error::from)
    }

    /// Every queued write, oldest first.
    pub async fn pending_writes(&self) -> Result<Vec<PendingWrite>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PendingWrite>, Error> {
                let tx = conn.transaction()?;
                let rows = {
                    let mut stmt = tx.prepare(
                        "SELECT id, payload, status, created_at, attempts, last_error
                         FROM pending_writes ORDER BY id ASC",
                    )?;
                    let rows = stmt.query_map([], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, u32>(4)?,
                            row.get::<_, Option<String>>(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                    rows
                };
                tx.commit()?;

                rows.into_iter()
                    .map(|(id, payload, status, created_at, attempts, last_error)| -> Result<PendingWrite, Error> {
                        Ok(PendingWrite {
                            id,
                            payload: serde_json::from_str(&payload)?,
                            status: status.parse()?,
                            created_at,
                            attempts,
                            last_error,
                        })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Number of queued writes.
    pub async fn pending_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let count: i64 = tx.query_row("SELECT COUNT(*) FROM pending_writes", [], |row| row.get(0))?;
                tx.commit()?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a replayed write. Returns false if it was already gone.
    pub async fn delete_pending(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let count = tx.execute("DELETE FROM pending_writes WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Record a failed replay attempt against a queued write.
    pub async fn record_failed_attempt(&self, id: i64, reason: &str) -> Result<(), Error> {
        let reason = reason.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "UPDATE pending_writes SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
                    params![id, reason],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
