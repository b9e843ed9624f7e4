//! Install: warm the static bucket with the app shell.
//!
//! The whole manifest is fetched before anything is written. One failed or
//! non-ok entry fails the install and leaves the cache untouched.

use std::collections::HashSet;

use serde::Serialize;
use shellcache_core::{Error, Request};
use tokio::task::JoinSet;

use super::{Worker, WorkerState};
use crate::fetch::resolve;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub version: String,
    pub precached: usize,
}

impl Worker {
    pub(crate) async fn install(&self) -> Result<InstallReport, Error> {
        self.set_state(WorkerState::Installing);
        match self.warm().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed);
                tracing::info!(version = self.version(), precached = report.precached, "worker installed");
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                tracing::warn!(version = self.version(), error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn warm(&self) -> Result<InstallReport, Error> {
        let origin = self.settings.router.origin();
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();

        for path in &self.settings.precache {
            if !seen.insert(path.as_str()) {
                continue;
            }
            let url = resolve(origin, path).map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;
            let request = Request::get(url);
            let network = self.platform.network.clone();
            let index = seen.len();
            let path = path.clone();
            tasks.spawn(async move {
                let result = network.fetch(&request).await;
                (index, path, request, result)
            });
        }

        let mut fetched = Vec::with_capacity(tasks.len());
        // an early return drops the set and aborts the remaining fetches
        while let Some(joined) = tasks.join_next().await {
            let (index, path, request, result) = joined.map_err(|e| Error::InstallFailed(e.to_string()))?;
            let response = result.map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;
            if !response.is_ok() {
                return Err(Error::InstallFailed(format!("{path}: status {}", response.status)));
            }
            fetched.push((index, request, response));
        }
        fetched.sort_by_key(|(index, ..)| *index);

        let exchanges: Vec<_> = fetched.into_iter().map(|(_, request, response)| (request, response)).collect();
        self.caches.precache(&exchanges).await?;
        self.caches.open_all().await?;

        Ok(InstallReport { version: self.version().to_string(), precached: exchanges.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Harness, url};
    use super::*;
    use shellcache_core::{BucketKind, Response};

    #[tokio::test]
    async fn test_install_precaches_manifest() {
        let harness = Harness::new().await;
        harness.network.serve("/", Response::new(200, "shell"));
        harness.network.serve("/offline", Response::new(200, "offline page"));
        let worker = harness.worker("v1", &["/", "/offline"]);

        let report = worker.install().await.unwrap();
        assert_eq!(report.precached, 2);
        assert_eq!(worker.state(), WorkerState::Installed);

        let cached = worker.caches().match_in(BucketKind::Static, &Request::get(url("/offline"))).await.unwrap();
        assert_eq!(cached.unwrap().body, "offline page");
        for name in worker.settings().names.all() {
            assert!(harness.db.has_bucket(&name).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_install_fails_closed_on_bad_status() {
        let harness = Harness::new().await;
        harness.network.serve("/", Response::new(200, "shell"));
        let worker = harness.worker("v2", &["/", "/missing"]);

        let result = worker.install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(harness.db.bucket_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_fails_when_offline() {
        let harness = Harness::new().await;
        harness.network.set_offline(true);
        let worker = harness.worker("v1", &["/"]);
        assert!(matches!(worker.install().await, Err(Error::InstallFailed(_))));
        assert!(harness.db.bucket_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_skips_duplicate_paths() {
        let harness = Harness::new().await;
        harness.network.serve("/", Response::new(200, "shell"));
        let worker = harness.worker("v1", &["/", "/"]);
        assert_eq!(worker.install().await.unwrap().precached, 1);
    }

    #[tokio::test]
    async fn test_install_empty_manifest_opens_buckets() {
        let harness = Harness::new().await;
        let worker = harness.worker("v1", &[]);
        assert_eq!(worker.install().await.unwrap().precached, 0);
        assert_eq!(harness.db.bucket_names().await.unwrap().len(), 3);
    }
}
