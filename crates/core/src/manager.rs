//! The three versioned buckets and the operations the worker performs on them.
//!
//! `CacheManager` is handed to every handler explicitly; nothing reaches the
//! buckets through ambient state.

use serde::{Deserialize, Serialize};

use crate::cache::{CacheDb, StoredEntry, hash::compute_request_key};
use crate::request::{Request, Response};
use crate::Error;

/// The logical bucket a route reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    /// Immutable app shell: precached routes, fonts, build artifacts.
    Static,
    /// Pages and images fetched on demand.
    Dynamic,
    /// Remote data responses.
    Api,
}

impl BucketKind {
    pub const ALL: [BucketKind; 3] = [BucketKind::Static, BucketKind::Dynamic, BucketKind::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketKind::Static => "static",
            BucketKind::Dynamic => "dynamic",
            BucketKind::Api => "api",
        }
    }
}

/// Bucket naming for one generation: `{prefix}-{kind}-{tag}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketNames {
    prefix: String,
    tag: String,
}

impl BucketNames {
    pub fn new(prefix: &str, tag: &str) -> Self {
        Self { prefix: prefix.to_string(), tag: tag.to_string() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn name(&self, kind: BucketKind) -> String {
        format!("{}-{}-{}", self.prefix, kind.as_str(), self.tag)
    }

    /// Names of all three buckets, static first.
    pub fn all(&self) -> Vec<String> {
        BucketKind::ALL.iter().map(|kind| self.name(*kind)).collect()
    }

    /// Whether `name` is one of this generation's buckets.
    pub fn is_current(&self, name: &str) -> bool {
        BucketKind::ALL.iter().any(|kind| self.name(*kind) == name)
    }
}

/// Handle over the current generation's buckets.
#[derive(Debug, Clone)]
pub struct CacheManager {
    db: CacheDb,
    names: BucketNames,
}

impl CacheManager {
    pub fn new(db: CacheDb, names: BucketNames) -> Self {
        Self { db, names }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn names(&self) -> &BucketNames {
        &self.names
    }

    /// Open all three buckets of this generation.
    pub async fn open_all(&self) -> Result<(), Error> {
        for name in self.names.all() {
            self.db.open_bucket(&name).await?;
        }
        Ok(())
    }

    /// Store a response under the request's identity, replacing any previous one.
    pub async fn put(&self, kind: BucketKind, request: &Request, response: &Response) -> Result<(), Error> {
        let entry = StoredEntry::from_exchange(&self.names.name(kind), request, response)?;
        self.db.put_entry(&entry).await
    }

    /// Store a response only while its bucket is still open.
    ///
    /// Writes that finish after the bucket was reaped are dropped, so a
    /// superseded generation cannot bring its buckets back.
    pub async fn store(&self, kind: BucketKind, request: &Request, response: &Response) -> Result<bool, Error> {
        let entry = StoredEntry::from_exchange(&self.names.name(kind), request, response)?;
        self.db.put_entry_if_open(&entry).await
    }

    /// Write the app shell into the static bucket in one transaction.
    pub async fn precache(&self, exchanges: &[(Request, Response)]) -> Result<(), Error> {
        let bucket = self.names.name(BucketKind::Static);
        let entries = exchanges
            .iter()
            .map(|(request, response)| StoredEntry::from_exchange(&bucket, request, response))
            .collect::<Result<Vec<_>, _>>()?;
        self.db.put_entries(entries).await
    }

    /// Cached response for the request in one bucket.
    pub async fn match_in(&self, kind: BucketKind, request: &Request) -> Result<Option<Response>, Error> {
        let key = compute_request_key(&request.method, request.url.as_str());
        match self.db.get_entry(&self.names.name(kind), &key).await? {
            Some(entry) => entry.to_response().map(Some),
            None => Ok(None),
        }
    }

    /// Cached response for the request in any bucket of this generation.
    pub async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        let key = compute_request_key(&request.method, request.url.as_str());
        match self.db.match_entry(&self.names.all(), &key).await? {
            Some(entry) => entry.to_response().map(Some),
            None => Ok(None),
        }
    }

    /// Delete every bucket that does not belong to this generation, then make
    /// sure this generation's buckets exist.
    ///
    /// Returns the names of the deleted buckets. Running it twice deletes nothing
    /// the second time.
    pub async fn reap_stale(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.db.bucket_names().await? {
            if self.names.is_current(&name) {
                continue;
            }
            if self.db.delete_bucket(&name).await? {
                tracing::info!(bucket = %name, "deleted stale bucket");
                deleted.push(name);
            }
        }
        self.open_all().await?;
        Ok(deleted)
    }
}
