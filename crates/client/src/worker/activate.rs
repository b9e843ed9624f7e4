//! Activation: drop every bucket outside the new generation and claim open clients.

use serde::Serialize;
use shellcache_core::Error;

use super::{Worker, WorkerState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ActivationReport {
    pub version: String,
    /// Buckets from older generations that were deleted.
    pub deleted: Vec<String>,
    /// Client windows taken over.
    pub claimed: usize,
}

impl Worker {
    /// Retire every older generation's buckets, then claim open clients.
    pub(crate) async fn activate(&self) -> Result<ActivationReport, Error> {
        self.set_state(WorkerState::Activating);
        let deleted = self.caches.reap_stale().await?;
        let claimed = self.platform.clients.claim().await?;
        self.set_state(WorkerState::Activated);
        tracing::info!(version = self.version(), deleted = deleted.len(), claimed, "worker activated");
        Ok(ActivationReport { version: self.version().to_string(), deleted, claimed })
    }
}
