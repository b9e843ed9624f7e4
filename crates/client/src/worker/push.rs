//! Push messages and notification clicks.

use serde::{Deserialize, Serialize};
use shellcache_core::Error;

use super::Worker;
use crate::platform::{ClientWindow, Notification, NotificationAction};

const DISMISS_ACTION: &str = "dismiss";

/// Fields a push payload may carry. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub actions: Option<Vec<NotificationAction>>,
    #[serde(default)]
    pub require_interaction: bool,
    #[serde(default)]
    pub silent: bool,
}

impl PushPayload {
    /// Decode a raw push payload.
    ///
    /// A payload that is not a JSON object is shown as the notification body.
    pub fn parse(raw: Option<&[u8]>) -> Self {
        let Some(raw) = raw.filter(|r| !r.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_slice(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "push payload is not JSON, using it as body");
                Self { body: Some(String::from_utf8_lossy(raw).into_owned()), ..Self::default() }
            }
        }
    }
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    Dismissed,
    Focused { window: u64, navigated_to: Option<String> },
    Opened { window: ClientWindow },
}

fn default_actions() -> Vec<NotificationAction> {
    vec![
        NotificationAction { action: "view".into(), title: "View".into(), icon: None },
        NotificationAction { action: DISMISS_ACTION.into(), title: "Dismiss".into(), icon: None },
    ]
}

impl Worker {
    /// Fill in the defaults for anything the payload left out.
    pub fn notification_for(&self, payload: PushPayload) -> Notification {
        let icon = payload.icon.unwrap_or_else(|| self.settings.notification_icon.clone());
        Notification {
            title: payload.title.unwrap_or_else(|| self.settings.notification_title.clone()),
            body: payload.body.unwrap_or_default(),
            badge: payload.badge.or_else(|| Some(icon.clone())),
            icon: Some(icon),
            image: payload.image,
            tag: payload.tag,
            data: if payload.data.is_null() { serde_json::json!({}) } else { payload.data },
            actions: payload.actions.unwrap_or_else(default_actions),
            require_interaction: payload.require_interaction,
            silent: payload.silent,
        }
    }

    pub(crate) async fn handle_push(&self, raw: Option<&[u8]>) -> Result<Notification, Error> {
        let notification = self.notification_for(PushPayload::parse(raw));
        self.platform.notifier.show(&notification).await?;
        Ok(notification)
    }

    pub(crate) async fn handle_click(
        &self, notification: &Notification, action: Option<&str>,
    ) -> Result<ClickOutcome, Error> {
        self.platform.notifier.close(notification).await?;
        if action == Some(DISMISS_ACTION) {
            return Ok(ClickOutcome::Dismissed);
        }

        let target = notification.target_url();
        let clients = &self.platform.clients;
        if let Some(window) = clients.windows().await?.into_iter().next() {
            clients.focus(window.id).await?;
            if let Some(url) = target {
                clients.navigate(window.id, url).await?;
            }
            return Ok(ClickOutcome::Focused { window: window.id, navigated_to: target.map(String::from) });
        }

        let window = clients.open_window(target.unwrap_or("/")).await?;
        Ok(ClickOutcome::Opened { window })
    }
}
