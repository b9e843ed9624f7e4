//! Entry CRUD operations.
//!
//! An entry is one stored response addressed by `(bucket, request key)`.
//! Writes replace the whole row, so two writers racing on the same key leave
//! exactly one of the two responses behind.

use super::buckets::ensure_bucket;
use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use crate::request::{Request, Response, ResponseKind};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached response together with the request identity it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub bucket: String,
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub kind: String,
    pub headers_json: String,
    pub body: Vec<u8>,
    pub stored_at: String,
}

/// Entry metadata without the body, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntrySummary {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub body_len: u64,
    pub stored_at: String,
}

impl StoredEntry {
    /// Capture a response for storage under the request's identity.
    pub fn from_exchange(bucket: &str, request: &Request, response: &Response) -> Result<Self, Error> {
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::CorruptEntry(format!("failed to encode headers: {e}")))?;
        Ok(Self {
            bucket: bucket.to_string(),
            key_hash: compute_request_key(&request.method, request.url.as_str()),
            method: request.method.clone(),
            url: request.url.to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            kind: response.kind.as_str().to_string(),
            headers_json,
            body: response.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Rebuild the response exactly as it was stored.
    pub fn to_response(&self) -> Result<Response, Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::CorruptEntry(format!("{}: bad headers: {e}", self.url)))?;
        let kind = ResponseKind::parse(&self.kind)
            .ok_or_else(|| Error::CorruptEntry(format!("{}: unknown kind {}", self.url, self.kind)))?;
        Ok(Response {
            status: self.status,
            status_text: self.status_text.clone(),
            headers,
            body: self.body.clone().into(),
            kind,
        })
    }
}

fn insert_entry(conn: &rusqlite::Connection, entry: &StoredEntry) -> Result<(), Error> {
    ensure_bucket(conn, &entry.bucket)?;
    write_row(conn, entry)
}

fn write_row(conn: &rusqlite::Connection, entry: &StoredEntry) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO entries (
            bucket, key_hash, method, url, status, status_text, kind,
            headers_json, body, stored_at, body_len
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(bucket, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            kind = excluded.kind,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at,
            body_len = excluded.body_len",
        params![
            &entry.bucket,
            &entry.key_hash,
            &entry.method,
            &entry.url,
            entry.status as i64,
            &entry.status_text,
            &entry.kind,
            &entry.headers_json,
            &entry.body,
            &entry.stored_at,
            entry.body.len() as i64,
        ],
    )?;
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEntry> {
    Ok(StoredEntry {
        bucket: row.get(0)?,
        key_hash: row.get(1)?,
        method: row.get(2)?,
        url: row.get(3)?,
        status: row.get::<_, i64>(4)? as u16,
        status_text: row.get(5)?,
        kind: row.get(6)?,
        headers_json: row.get(7)?,
        body: row.get(8)?,
        stored_at: row.get(9)?,
    })
}

const ENTRY_COLUMNS: &str =
    "e.bucket, e.key_hash, e.method, e.url, e.status, e.status_text, e.kind, e.headers_json, e.body, e.stored_at";

impl CacheDb {
    /// Insert or replace an entry, opening its bucket if needed.
    pub async fn put_entry(&self, entry: &StoredEntry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> { insert_entry(conn, &entry) })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry only if its bucket still exists.
    ///
    /// Returns false, writing nothing, when the bucket has been deleted.
    pub async fn put_entry_if_open(&self, entry: &StoredEntry) -> Result<bool, Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let open: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)",
                    params![entry.bucket],
                    |row| row.get(0),
                )?;
                if open {
                    write_row(&tx, &entry)?;
                }
                tx.commit()?;
                Ok(open)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace several entries in one transaction.
    ///
    /// Either every entry is written or none is.
    pub async fn put_entries(&self, entries: Vec<StoredEntry>) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    insert_entry(&tx, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry in one bucket.
    ///
    /// Returns None if either the bucket or the key is missing.
    pub async fn get_entry(&self, bucket: &str, key_hash: &str) -> Result<Option<StoredEntry>, Error> {
        let bucket = bucket.to_string();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.bucket = ?1 AND e.key_hash = ?2");
                let result = conn.query_row(&sql, params![bucket, key_hash], row_to_entry);
                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry in any of the given buckets, first bucket by creation order wins.
    pub async fn match_entry(&self, buckets: &[String], key_hash: &str) -> Result<Option<StoredEntry>, Error> {
        if buckets.is_empty() {
            return Ok(None);
        }
        let buckets = buckets.to_vec();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let placeholders = (2..buckets.len() + 2)
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e JOIN buckets b ON b.name = e.bucket
                     WHERE e.key_hash = ?1 AND e.bucket IN ({placeholders})
                     ORDER BY b.seq ASC LIMIT 1"
                );
                let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(buckets.len() + 1);
                values.push(&key_hash);
                for name in &buckets {
                    values.push(name);
                }
                let result = conn.query_row(&sql, values.as_slice(), row_to_entry);
                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns false if it did not exist.
    pub async fn delete_entry(&self, bucket: &str, key_hash: &str) -> Result<bool, Error> {
        let bucket = bucket.to_string();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE bucket = ?1 AND key_hash = ?2",
                    params![bucket, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List a bucket's entries, oldest first.
    pub async fn bucket_entries(&self, bucket: &str) -> Result<Vec<EntrySummary>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntrySummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, body_len, stored_at FROM entries
                     WHERE bucket = ?1 ORDER BY stored_at ASC, url ASC",
                )?;
                let entries = stmt
                    .query_map(params![bucket], |row| {
                        Ok(EntrySummary {
                            method: row.get(0)?,
                            url: row.get(1)?,
                            status: row.get::<_, i64>(2)? as u16,
                            body_len: row.get::<_, i64>(3)? as u64,
                            stored_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}
