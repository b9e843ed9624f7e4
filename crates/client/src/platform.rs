//! Host-side facilities the worker talks to: open client windows and the
//! notification tray.
//!
//! The in-memory implementations back the proxy host, which has no real
//! browser tabs, and the tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shellcache_core::Error;

use crate::fetch::Network;

/// The facilities handed to every worker generation.
#[derive(Clone)]
pub struct Platform {
    pub network: Arc<dyn Network>,
    pub clients: Arc<dyn Clients>,
    pub notifier: Arc<dyn Notifier>,
}

impl Platform {
    pub fn new(network: Arc<dyn Network>, clients: Arc<dyn Clients>, notifier: Arc<dyn Notifier>) -> Self {
        Self { network, clients, notifier }
    }
}

/// A button shown on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A notification as rendered by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    /// Echoed back on click.
    pub data: serde_json::Value,
    pub actions: Vec<NotificationAction>,
    pub require_interaction: bool,
    pub silent: bool,
}

impl Notification {
    /// URL carried in `data.url`, if any.
    pub fn target_url(&self) -> Option<&str> {
        self.data.get("url").and_then(|v| v.as_str()).filter(|s| !s.is_empty())
    }
}

/// A window (tab) the worker can control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ClientWindow {
    pub id: u64,
    pub url: String,
    pub focused: bool,
    pub controlled: bool,
}

/// Open client windows.
#[async_trait]
pub trait Clients: Send + Sync {
    /// All open windows, most recently focused first.
    async fn windows(&self) -> Result<Vec<ClientWindow>, Error>;

    async fn focus(&self, id: u64) -> Result<(), Error>;

    async fn navigate(&self, id: u64, url: &str) -> Result<(), Error>;

    async fn open_window(&self, url: &str) -> Result<ClientWindow, Error>;

    /// Take control of every open window.
    async fn claim(&self) -> Result<usize, Error>;
}

/// The platform notification tray.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), Error>;

    async fn close(&self, notification: &Notification) -> Result<(), Error>;
}

/// Window registry kept in memory.
#[derive(Debug, Default)]
pub struct MemoryClients {
    windows: Mutex<Vec<ClientWindow>>,
    next_id: AtomicU64,
}

impl MemoryClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the windows without going through the async trait.
    pub fn snapshot(&self) -> Vec<ClientWindow> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ClientWindow>> {
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn unknown(id: u64) -> Error {
        Error::InvalidInput(format!("no client window {id}"))
    }
}

#[async_trait]
impl Clients for MemoryClients {
    async fn windows(&self) -> Result<Vec<ClientWindow>, Error> {
        let mut windows = self.snapshot();
        windows.sort_by_key(|w| !w.focused);
        Ok(windows)
    }

    async fn focus(&self, id: u64) -> Result<(), Error> {
        let mut windows = self.lock();
        if !windows.iter().any(|w| w.id == id) {
            return Err(Self::unknown(id));
        }
        for window in windows.iter_mut() {
            window.focused = window.id == id;
        }
        Ok(())
    }

    async fn navigate(&self, id: u64, url: &str) -> Result<(), Error> {
        let mut windows = self.lock();
        let window = windows.iter_mut().find(|w| w.id == id).ok_or_else(|| Self::unknown(id))?;
        window.url = url.to_string();
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<ClientWindow, Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut windows = self.lock();
        for window in windows.iter_mut() {
            window.focused = false;
        }
        let window = ClientWindow { id, url: url.to_string(), focused: true, controlled: false };
        windows.push(window.clone());
        Ok(window)
    }

    async fn claim(&self) -> Result<usize, Error> {
        let mut windows = self.lock();
        for window in windows.iter_mut() {
            window.controlled = true;
        }
        Ok(windows.len())
    }
}

/// Notification tray kept in memory; every notification is also logged.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently in the tray, oldest first.
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(title = %notification.title, tag = ?notification.tag, "showing notification");
        let mut shown = self.shown.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // same tag replaces the previous notification
        if let Some(tag) = &notification.tag {
            shown.retain(|n| n.tag.as_ref() != Some(tag));
        }
        shown.push(notification.clone());
        Ok(())
    }

    async fn close(&self, notification: &Notification) -> Result<(), Error> {
        let mut shown = self.shown.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pos) = shown.iter().position(|n| n == notification) {
            shown.remove(pos);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(tag: Option<&str>) -> Notification {
        Notification {
            title: "Booking confirmed".into(),
            body: "See you Tuesday".into(),
            icon: None,
            badge: None,
            image: None,
            tag: tag.map(String::from),
            data: serde_json::json!({ "url": "/bookings/1" }),
            actions: Vec::new(),
            require_interaction: false,
            silent: false,
        }
    }

    #[test]
    fn test_target_url() {
        assert_eq!(notification(None).target_url(), Some("/bookings/1"));
        let mut n = notification(None);
        n.data = serde_json::json!({});
        assert_eq!(n.target_url(), None);
    }

    #[tokio::test]
    async fn test_memory_clients_open_focus_navigate() {
        let clients = MemoryClients::new();
        let first = clients.open_window("/").await.unwrap();
        let second = clients.open_window("/skills").await.unwrap();

        let windows = clients.windows().await.unwrap();
        assert_eq!(windows[0].id, second.id);

        clients.focus(first.id).await.unwrap();
        clients.navigate(first.id, "/bookings").await.unwrap();
        let windows = clients.windows().await.unwrap();
        assert_eq!(windows[0].id, first.id);
        assert_eq!(windows[0].url, "/bookings");

        assert!(clients.focus(99).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_clients_claim() {
        let clients = MemoryClients::new();
        clients.open_window("/").await.unwrap();
        clients.open_window("/profile").await.unwrap();
        assert_eq!(clients.claim().await.unwrap(), 2);
        assert!(clients.snapshot().iter().all(|w| w.controlled));
    }

    #[tokio::test]
    async fn test_memory_notifier_tag_replaces() {
        let notifier = MemoryNotifier::new();
        notifier.show(&notification(Some("booking"))).await.unwrap();
        notifier.show(&notification(Some("booking"))).await.unwrap();
        notifier.show(&notification(None)).await.unwrap();
        assert_eq!(notifier.shown().len(), 2);

        notifier.close(&notification(None)).await.unwrap();
        assert_eq!(notifier.shown().len(), 1);
    }
}
