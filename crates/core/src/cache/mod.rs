//! SQLite-backed storage for named cache buckets.
//!
//! This module provides a persistent bucket store using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Named buckets created on first open and deleted as a whole
//! - Entries keyed by request identity (SHA-256 of method and URL)
//! - Whole-entry replacement, so concurrent writers never interleave
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod buckets;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use buckets::BucketInfo;
pub use connection::CacheDb;
pub use entries::{EntrySummary, StoredEntry};
