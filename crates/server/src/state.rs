//! Shared state handed to the MCP tools and the HTTP proxy.

use std::sync::Arc;

use shellcache_client::{Registration, WorkerSettings};
use shellcache_core::{AppConfig, CacheDb, Error};
use url::Url;

/// Shared by the proxy and the MCP handler.
pub struct AppState {
    pub config: AppConfig,
    pub origin: Url,
    pub db: CacheDb,
    pub registration: Arc<Registration>,
}

impl AppState {
    pub fn new(config: AppConfig, origin: Url, db: CacheDb, registration: Arc<Registration>) -> Arc<Self> {
        Arc::new(Self { config, origin, db, registration })
    }

    /// Worker settings for the configured version, with optional overrides.
    pub fn settings(&self, version_tag: Option<&str>, precache: Option<Vec<String>>) -> Result<WorkerSettings, Error> {
        let mut config = self.config.clone();
        if let Some(tag) = version_tag {
            if tag.trim().is_empty() {
                return Err(Error::InvalidInput("version_tag cannot be empty".into()));
            }
            config.version_tag = tag.trim().to_string();
        }
        if let Some(precache) = precache {
            if let Some(bad) = precache.iter().find(|p| !p.starts_with('/')) {
                return Err(Error::InvalidInput(format!("precache path must start with '/': {bad}")));
            }
            config.precache = precache;
        }
        WorkerSettings::from_config(&config).map_err(|e| Error::InvalidInput(e.to_string()))
    }
}
