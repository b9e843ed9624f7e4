//! Background work a worker must finish before it may be torn down.
//!
//! Cache writes scheduled from the response path are spawned here so the
//! response can be returned right away; the host calls [`Lifetime::settle`]
//! to wait for them before shutting the worker down.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

/// Tracks spawned tasks that extend a worker's lifetime.
#[derive(Debug, Clone, Default)]
pub struct Lifetime {
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Lifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` and keep the worker alive until it completes.
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Number of tracked tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every tracked task, including ones spawned while waiting.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                pending.drain(..).collect()
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "background task did not complete");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_settle_waits_for_tasks() {
        let lifetime = Lifetime::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            lifetime.wait_until(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        lifetime.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(lifetime.pending(), 0);
    }

    #[tokio::test]
    async fn test_settle_with_nothing_pending() {
        Lifetime::new().settle().await;
    }

    #[tokio::test]
    async fn test_settle_survives_panicking_task() {
        let lifetime = Lifetime::new();
        lifetime.wait_until(async { panic!("write failed hard") });
        lifetime.settle().await;
        assert_eq!(lifetime.pending(), 0);
    }
}
