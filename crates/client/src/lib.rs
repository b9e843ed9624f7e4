//! The shellcache worker.
//!
//! This crate provides the upstream fetch pipeline, the caching strategies,
//! the worker lifecycle and event handlers, and the registration that holds
//! the active and waiting worker generations. Hosts (the HTTP proxy and the
//! MCP server) only talk to [`Registration`].

pub mod fetch;
pub mod lifetime;
pub mod platform;
pub mod registration;
pub mod strategy;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Network};
pub use lifetime::Lifetime;
pub use platform::{ClientWindow, Clients, MemoryClients, MemoryNotifier, Notification, NotificationAction, Notifier, Platform};
pub use registration::{Registration, RegistrationStatus, Served, UpdateReport, WorkerInfo};
pub use worker::{
    ActivationReport, ClickOutcome, ClientMessage, EventOutcome, FetchOutcome, InstallReport, PushPayload, Worker,
    WorkerEvent, WorkerSettings, WorkerState,
};
