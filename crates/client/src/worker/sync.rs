//! Background and periodic sync events. Nothing is queued for replay.

use super::Worker;

impl Worker {
    // Nothing is queued while offline yet, so there is nothing to replay.
    pub(crate) fn handle_sync(&self, tag: &str) {
        tracing::debug!(version = self.version(), tag, "background sync: nothing to replay");
    }

    pub(crate) fn handle_periodic_sync(&self, tag: &str) {
        tracing::debug!(version = self.version(), tag, "periodic sync: nothing to refresh");
    }
}
