//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Request/response model shared by the worker and its hosts
//! - Versioned cache buckets with a SQLite backend
//! - The request classifier that picks a caching strategy
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod manager;
pub mod request;

pub use cache::{CacheDb, StoredEntry};
pub use classify::{ResourceClass, Route, Router, Strategy};
pub use config::AppConfig;
pub use error::Error;
pub use manager::{BucketKind, BucketNames, CacheManager};
pub use request::{Destination, Request, RequestMode, Response, ResponseKind};
