//! One generation of the worker.
//!
//! A [`Worker`] owns the bucket names of its version tag and answers the
//! lifecycle, fetch, message, push and sync events the host dispatches to it.
//! Every event goes through [`Worker::dispatch`]; the handlers live in the
//! submodules.

mod activate;
mod fetch;
mod install;
mod push;
mod sync;

#[cfg(test)]
mod scenarios;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use shellcache_core::config::ConfigError;
use shellcache_core::{AppConfig, BucketNames, CacheDb, CacheManager, Error, Request, Router};

use crate::lifetime::Lifetime;
use crate::platform::{Notification, Platform};

pub use activate::ActivationReport;
pub use fetch::FetchOutcome;
pub use install::InstallReport;
pub use push::{ClickOutcome, PushPayload};

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Messages a page can post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate the waiting worker without waiting for old clients to close.
    SkipWaiting,
}

impl ClientMessage {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidPayload(format!("client message: {e}")))
    }
}

/// Events the host delivers to a worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(ClientMessage),
    Push(Option<Bytes>),
    NotificationClick { notification: Notification, action: Option<String> },
    Sync { tag: String },
    PeriodicSync { tag: String },
}

/// What handling an event produced.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetch(FetchOutcome),
    SkipWaiting,
    Notified(Notification),
    Clicked(ClickOutcome),
    Done,
}

/// Per-version settings, fixed for the lifetime of a worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub names: BucketNames,
    pub router: Router,
    /// Absolute paths fetched during install.
    pub precache: Vec<String>,
    pub notification_title: String,
    pub notification_icon: String,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            names: config.bucket_names(),
            router: Router::from_config(config)?,
            precache: config.precache.clone(),
            notification_title: config.notification_title.clone(),
            notification_icon: config.notification_icon.clone(),
        })
    }

    pub fn version(&self) -> &str {
        self.names.tag()
    }
}

/// A single worker version.
pub struct Worker {
    settings: WorkerSettings,
    caches: CacheManager,
    platform: Platform,
    lifetime: Lifetime,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Worker {
    pub fn new(db: CacheDb, settings: WorkerSettings, platform: Platform) -> Self {
        let caches = CacheManager::new(db, settings.names.clone());
        Self {
            settings,
            caches,
            platform,
            lifetime: Lifetime::new(),
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn version(&self) -> &str {
        self.settings.version()
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        let mut current = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *current != state {
            tracing::debug!(version = self.version(), from = ?*current, to = ?state, "worker state");
            *current = state;
        }
    }

    /// Ask to be activated as soon as install completes.
    pub fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Number of background cache writes still running.
    pub fn pending_writes(&self) -> usize {
        self.lifetime.pending()
    }

    /// Wait for background cache writes.
    pub async fn settle(&self) {
        self.lifetime.settle().await;
    }

    /// Handle one event.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => Ok(EventOutcome::Fetch(self.handle_fetch(&request).await)),
            WorkerEvent::Message(message) => Ok(self.handle_message(message)),
            WorkerEvent::Push(payload) => self.handle_push(payload.as_deref()).await.map(EventOutcome::Notified),
            WorkerEvent::NotificationClick { notification, action } => self
                .handle_click(&notification, action.as_deref())
                .await
                .map(EventOutcome::Clicked),
            WorkerEvent::Sync { tag } => {
                self.handle_sync(&tag);
                Ok(EventOutcome::Done)
            }
            WorkerEvent::PeriodicSync { tag } => {
                self.handle_periodic_sync(&tag);
                Ok(EventOutcome::Done)
            }
        }
    }

    fn handle_message(&self, message: ClientMessage) -> EventOutcome {
        match message {
            ClientMessage::SkipWaiting => {
                tracing::info!(version = self.version(), "skip waiting requested");
                self.request_skip_waiting();
                EventOutcome::SkipWaiting
            }
        }
    }
}
