//! The active and waiting worker slots.
//!
//! A freshly installed worker becomes active straight away when nothing is
//! active yet or it asked to skip waiting; otherwise it waits until a
//! `SKIP_WAITING` message promotes it. A failed install never touches the
//! active worker.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use shellcache_core::{CacheDb, Error, Request, Response, Route};
use tokio::sync::{Mutex, RwLock};

use crate::platform::{Notification, Platform};
use crate::worker::{
    ActivationReport, ClickOutcome, ClientMessage, EventOutcome, FetchOutcome, InstallReport, Worker, WorkerEvent,
    WorkerSettings, WorkerState,
};

/// Snapshot of one worker for status reporting.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct WorkerInfo {
    pub version: String,
    pub state: WorkerState,
    pub skip_waiting: bool,
    pub pending_writes: usize,
    /// RFC 3339 timestamp.
    pub installed_at: String,
}

#[derive(Debug, Clone, Default, Serialize, schemars::JsonSchema)]
pub struct RegistrationStatus {
    pub active: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
}

/// Result of installing a new version.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct UpdateReport {
    pub install: InstallReport,
    /// Present when the new worker was activated immediately.
    pub activation: Option<ActivationReport>,
}

/// A request answered through the registration.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    /// `None` when the request went straight to the network.
    pub route: Option<Route>,
    pub version: Option<String>,
}

struct Slot {
    worker: Arc<Worker>,
    installed_at: String,
}

impl Slot {
    fn info(&self) -> WorkerInfo {
        WorkerInfo {
            version: self.worker.version().to_string(),
            state: self.worker.state(),
            skip_waiting: self.worker.skip_waiting_requested(),
            pending_writes: self.worker.pending_writes(),
            installed_at: self.installed_at.clone(),
        }
    }
}

#[derive(Default)]
struct Slots {
    active: Option<Slot>,
    waiting: Option<Slot>,
}

/// Owns the worker generations for one app origin.
pub struct Registration {
    db: CacheDb,
    platform: Platform,
    slots: RwLock<Slots>,
    /// Serializes installs and promotions.
    updating: Mutex<()>,
}

impl Registration {
    pub fn new(db: CacheDb, platform: Platform) -> Self {
        Self { db, platform, slots: RwLock::new(Slots::default()), updating: Mutex::new(()) }
    }

    /// Install a worker for `settings` and activate it when allowed.
    pub async fn register(&self, settings: WorkerSettings, skip_waiting: bool) -> Result<UpdateReport, Error> {
        let _updating = self.updating.lock().await;

        let worker = Arc::new(Worker::new(self.db.clone(), settings, self.platform.clone()));
        if skip_waiting {
            worker.request_skip_waiting();
        }

        let install = match worker.dispatch(WorkerEvent::Install).await? {
            EventOutcome::Installed(report) => report,
            other => return Err(Error::InvalidInput(format!("unexpected install outcome {other:?}"))),
        };
        let slot = Slot { worker: worker.clone(), installed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true) };

        let promote = self.slots.read().await.active.is_none() || worker.skip_waiting_requested();
        if !promote {
            tracing::info!(version = worker.version(), "new worker waiting");
            let replaced = self.slots.write().await.waiting.replace(slot);
            if let Some(previous) = replaced {
                previous.worker.set_state(WorkerState::Redundant);
            }
            return Ok(UpdateReport { install, activation: None });
        }

        let activation = self.promote(slot).await?;
        Ok(UpdateReport { install, activation: Some(activation) })
    }

    /// Make `slot` the active worker and run its activation.
    async fn promote(&self, slot: Slot) -> Result<ActivationReport, Error> {
        let worker = slot.worker.clone();
        let previous = {
            let mut slots = self.slots.write().await;
            if slots.waiting.as_ref().is_some_and(|w| Arc::ptr_eq(&w.worker, &worker)) {
                slots.waiting = None;
            }
            slots.active.replace(slot)
        };

        if let Some(previous) = previous {
            previous.worker.set_state(WorkerState::Redundant);
            previous.worker.settle().await;
            tracing::info!(from = previous.worker.version(), to = worker.version(), "worker replaced");
        }

        match worker.dispatch(WorkerEvent::Activate).await? {
            EventOutcome::Activated(report) => Ok(report),
            other => Err(Error::InvalidInput(format!("unexpected activate outcome {other:?}"))),
        }
    }

    /// Deliver a client message to the waiting worker, or the active one when
    /// nothing is waiting.
    pub async fn post_message(&self, message: ClientMessage) -> Result<Option<ActivationReport>, Error> {
        let _updating = self.updating.lock().await;
        let (target, is_waiting) = {
            let slots = self.slots.read().await;
            match (&slots.waiting, &slots.active) {
                (Some(waiting), _) => (waiting.worker.clone(), true),
                (None, Some(active)) => (active.worker.clone(), false),
                (None, None) => return Err(Error::NoActiveWorker),
            }
        };

        match target.dispatch(WorkerEvent::Message(message)).await? {
            EventOutcome::SkipWaiting if is_waiting => {
                let slot = self.slots.write().await.waiting.take();
                match slot {
                    Some(slot) => self.promote(slot).await.map(Some),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Answer a request: through the active worker when it intercepts it,
    /// otherwise straight from the network.
    pub async fn fetch(&self, request: Request) -> Result<Served, Error> {
        if let Some(worker) = self.active().await {
            let version = Some(worker.version().to_string());
            if let EventOutcome::Fetch(FetchOutcome::Respond { response, route }) =
                worker.dispatch(WorkerEvent::Fetch(request.clone())).await?
            {
                return Ok(Served { response, route: Some(route), version });
            }
        }

        let response = self.platform.network.fetch(&request).await?;
        Ok(Served { response, route: None, version: None })
    }

    pub async fn push(&self, payload: Option<Bytes>) -> Result<Notification, Error> {
        let worker = self.active().await.ok_or(Error::NoActiveWorker)?;
        match worker.dispatch(WorkerEvent::Push(payload)).await? {
            EventOutcome::Notified(notification) => Ok(notification),
            other => Err(Error::InvalidInput(format!("unexpected push outcome {other:?}"))),
        }
    }

    pub async fn notification_click(
        &self, notification: Notification, action: Option<String>,
    ) -> Result<ClickOutcome, Error> {
        let worker = self.active().await.ok_or(Error::NoActiveWorker)?;
        match worker.dispatch(WorkerEvent::NotificationClick { notification, action }).await? {
            EventOutcome::Clicked(outcome) => Ok(outcome),
            other => Err(Error::InvalidInput(format!("unexpected click outcome {other:?}"))),
        }
    }

    pub async fn sync(&self, tag: &str, periodic: bool) -> Result<(), Error> {
        let worker = self.active().await.ok_or(Error::NoActiveWorker)?;
        let tag = tag.to_string();
        let event = if periodic { WorkerEvent::PeriodicSync { tag } } else { WorkerEvent::Sync { tag } };
        worker.dispatch(event).await.map(|_| ())
    }

    pub async fn active(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.active.as_ref().map(|slot| slot.worker.clone())
    }

    pub async fn status(&self) -> RegistrationStatus {
        let slots = self.slots.read().await;
        RegistrationStatus {
            active: slots.active.as_ref().map(Slot::info),
            waiting: slots.waiting.as_ref().map(Slot::info),
        }
    }

    /// Wait for every worker's background cache writes.
    pub async fn settle(&self) {
        let workers: Vec<Arc<Worker>> = {
            let slots = self.slots.read().await;
            [&slots.active, &slots.waiting].into_iter().flatten().map(|slot| slot.worker.clone()).collect()
        };
        for worker in workers {
            worker.settle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{Harness, url};

    async fn registration(harness: &Harness) -> Registration {
        Registration::new(harness.db.clone(), harness.platform())
    }

    #[tokio::test]
    async fn test_first_install_activates() {
        let harness = Harness::new().await;
        let registration = registration(&harness).await;
        let report = registration.register(harness.settings("v1", &[]), false).await.unwrap();
        assert!(report.activation.is_some());

        let status = registration.status().await;
        assert_eq!(status.active.unwrap().state, WorkerState::Activated);
        assert!(status.waiting.is_none());
    }

    #[tokio::test]
    async fn test_second_install_waits_until_skip_waiting() {
        let harness = Harness::new().await;
        let registration = registration(&harness).await;
        registration.register(harness.settings("v1", &[]), false).await.unwrap();

        let report = registration.register(harness.settings("v2", &[]), false).await.unwrap();
        assert!(report.activation.is_none());
        let status = registration.status().await;
        assert_eq!(status.active.unwrap().version, "v1");
        assert_eq!(status.waiting.unwrap().state, WorkerState::Installed);

        let activation = registration.post_message(ClientMessage::SkipWaiting).await.unwrap().unwrap();
        assert_eq!(activation.version, "v2");
        assert_eq!(activation.deleted.len(), 3);
        let status = registration.status().await;
        assert_eq!(status.active.unwrap().version, "v2");
        assert!(status.waiting.is_none());
    }

    #[tokio::test]
    async fn test_failed_install_keeps_active_worker() {
        let harness = Harness::new().await;
        harness.network.serve("/", Response::new(200, "shell"));
        let registration = registration(&harness).await;
        registration.register(harness.settings("v1", &["/"]), false).await.unwrap();

        let result = registration.register(harness.settings("v2", &["/", "/gone"]), true).await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));

        let status = registration.status().await;
        assert_eq!(status.active.unwrap().version, "v1");
        assert!(status.waiting.is_none());
        assert!(harness.db.bucket_names().await.unwrap().iter().all(|b| b.ends_with("-v1")));
    }

    #[tokio::test]
    async fn test_post_message_without_worker() {
        let harness = Harness::new().await;
        let registration = registration(&harness).await;
        let result = registration.post_message(ClientMessage::SkipWaiting).await;
        assert!(matches!(result, Err(Error::NoActiveWorker)));
    }

    #[tokio::test]
    async fn test_fetch_without_worker_goes_to_network() {
        let harness = Harness::new().await;
        harness.network.serve("/skills", Response::new(200, "live"));
        let registration = registration(&harness).await;

        let served = registration.fetch(Request::navigate(url("/skills"))).await.unwrap();
        assert_eq!(served.response.body, "live");
        assert!(served.route.is_none());
    }

    #[tokio::test]
    async fn test_push_requires_active_worker() {
        let harness = Harness::new().await;
        let registration = registration(&harness).await;
        assert!(matches!(registration.push(None).await, Err(Error::NoActiveWorker)));
    }
}
