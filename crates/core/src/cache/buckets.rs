//! Bucket lifecycle: open, enumerate, delete.
//!
//! A bucket exists from the first time it is opened (or written to) until it
//! is deleted as a whole; deleting a bucket cascades to its entries.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Bucket name with its entry count, for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BucketInfo {
    pub name: String,
    pub created_at: String,
    pub entry_count: u64,
    pub bytes: u64,
}

/// Create the bucket row if it is missing. Runs inside an existing connection call.
pub(crate) fn ensure_bucket(conn: &rusqlite::Connection, name: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO buckets (name, created_at, seq)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(seq), 0) + 1 FROM buckets))",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl CacheDb {
    /// Open a bucket, creating it if it doesn't exist.
    pub async fn open_bucket(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> { ensure_bucket(conn, &name) })
            .await
            .map_err(Error::from)
    }

    /// Check whether a bucket exists.
    pub async fn has_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All bucket names in creation order.
    pub async fn bucket_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY seq ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// All buckets with entry counts and stored body sizes, in creation order.
    pub async fn bucket_infos(&self) -> Result<Vec<BucketInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<BucketInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT b.name, b.created_at, COUNT(e.key_hash), COALESCE(SUM(e.body_len), 0)
                     FROM buckets b LEFT JOIN entries e ON e.bucket = b.name
                     GROUP BY b.name ORDER BY b.seq ASC",
                )?;
                let infos = stmt
                    .query_map([], |row| {
                        Ok(BucketInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entry_count: row.get::<_, i64>(2)? as u64,
                            bytes: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(infos)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bucket and every entry in it.
    ///
    /// Returns false if the bucket did not exist.
    pub async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::CacheDb;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("app-static-v1").await.unwrap();
        db.open_bucket("app-static-v1").await.unwrap();
        assert_eq!(db.bucket_names().await.unwrap(), vec!["app-static-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_names_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("b").await.unwrap();
        db.open_bucket("a").await.unwrap();
        db.open_bucket("c").await.unwrap();
        assert_eq!(db.bucket_names().await.unwrap(), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_delete_bucket() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("old").await.unwrap();
        assert!(db.delete_bucket("old").await.unwrap());
        assert!(!db.delete_bucket("old").await.unwrap());
        assert!(!db.has_bucket("old").await.unwrap());
    }

    #[tokio::test]
    async fn test_bucket_infos_empty_bucket() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("empty").await.unwrap();
        let infos = db.bucket_infos().await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].entry_count, 0);
        assert_eq!(infos[0].bytes, 0);
    }
}
