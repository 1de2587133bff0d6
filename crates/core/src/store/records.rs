//! Content and summary record CRUD.
//!
//! Both families share the quiz id key space but live in separate tables.
//! Lookups always consult content first and summaries second; the two are
//! never merged.

use super::OfflineStore;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// Which record family a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFamily {
    /// Full quiz payload.
    Content,
    /// Lightweight metadata, fallback for content.
    Summary,
}

impl RecordFamily {
    fn table(self) -> &'static str {
        match self {
            RecordFamily::Content => "content_records",
            RecordFamily::Summary => "summary_records",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordFamily::Content => "content",
            RecordFamily::Summary => "summary",
        }
    }
}

impl std::fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted quiz document, keyed by its numeric id.
///
/// `document` always carries the `id` field, so it can be served as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub document: Map<String, Value>,
}

impl Record {
    /// Build a record from an id and the remaining payload fields.
    pub fn new(id: i64, mut fields: Map<String, Value>) -> Self {
        fields.insert("id".to_string(), Value::from(id));
        Self { id, document: fields }
    }

    /// Build a record from a full document, which must be a JSON object
    /// with a numeric (or numeric string) `id`.
    pub fn from_document(document: Value) -> Result<Self, Error> {
        let Value::Object(fields) = document else {
            return Err(Error::MalformedPayload("record document must be a JSON object".into()));
        };
        let id = fields
            .get("id")
            .and_then(parse_entity_id)
            .ok_or_else(|| Error::MalformedPayload("record document has no numeric id".into()))?;
        Ok(Self::new(id, fields))
    }

    /// The document as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.document.clone())
    }
}

/// Coerce a JSON id to the numeric key space.
pub fn parse_entity_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_record(conn: &rusqlite::Connection, family: RecordFamily, id: i64) -> Result<Option<Record>, Error> {
    let sql = format!("SELECT document FROM {} WHERE id = ?1", family.table());
    let document: Option<String> = conn.query_row(&sql, params![id], |row| row.get(0)).optional()?;
    document
        .map(|json| -> Result<Record, Error> {
            let fields: Map<String, Value> = serde_json::from_str(&json)?;
            Ok(Record { id, document: fields })
        })
        .transpose()
}

fn write_record(conn: &rusqlite::Connection, family: RecordFamily, record: &Record) -> Result<(), Error> {
    let sql = format!(
        "INSERT INTO {} (id, document, saved_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET document = excluded.document, saved_at = excluded.saved_at",
        family.table()
    );
    let document = serde_json::to_string(&record.document)?;
    conn.execute(&sql, params![record.id, document, chrono::Utc::now().to_rfc3339()])?;
    Ok(())
}

impl OfflineStore {
    /// Insert or replace a record in `family`.
    pub async fn put_record(&self, family: RecordFamily, record: &Record) -> Result<(), Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                write_record(&tx, family, &record)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace many records in `family` in one transaction.
    ///
    /// Returns the number of records written.
    pub async fn put_records(&self, family: RecordFamily, records: &[Record]) -> Result<usize, Error> {
        let records = records.to_vec();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                for record in &records {
                    write_record(&tx, family, record)?;
                }
                tx.commit()?;
                Ok(records.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a record by id from a single family.
    pub async fn get_record(&self, family: RecordFamily, id: i64) -> Result<Option<Record>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<Record>, Error> {
                let tx = conn.transaction()?;
                let record = read_record(&tx, family, id)?;
                tx.commit()?;
                Ok(record)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a record. Returns false if it didn't exist.
    pub async fn delete_record(&self, family: RecordFamily, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let sql = format!("DELETE FROM {} WHERE id = ?1", family.table());
                let tx = conn.transaction()?;
                let count = tx.execute(&sql, params![id])?;
                tx.commit()?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All records of a family, ordered by id.
    pub async fn list_records(&self, family: RecordFamily) -> Result<Vec<Record>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<Record>, Error> {
                let sql = format!("SELECT id, document FROM {} ORDER BY id", family.table());
                let tx = conn.transaction()?;
                let rows = {
                    let mut stmt = tx.prepare(&sql)?;
                    stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
                        .collect::<Result<Vec<_>, _>>()?
                };
                tx.commit()?;

                rows.into_iter()
                    .map(|(id, json)| -> Result<Record, Error> {
                        Ok(Record { id, document: serde_json::from_str(&json)? })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Resolve a quiz for offline serving: content first, then summary.
    ///
    /// Both reads happen inside one transaction.
    pub async fn find_quiz(&self, id: i64) -> Result<Option<(RecordFamily, Record)>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<(RecordFamily, Record)>, Error> {
                let tx = conn.transaction()?;
                for family in [RecordFamily::Content, RecordFamily::Summary] {
                    if let Some(record) = read_record(&tx, family, id)? {
                        return Ok(Some((family, record)));
                    }
                }
                Ok(None)
            })
            .await
            .map_err(Error::from)
    }
}
