//! Outbound HTTP notifications.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{NotificationError, Result};

/// Body posted to the notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    #[serde(rename_all = "camelCase")]
    OrderCreated {
        email: String,
        first_name: String,
        order_number: String,
    },
    #[serde(rename_all = "camelCase")]
    Welcome { email: String, first_name: String },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OrderCreated { .. } => "ORDER_CREATED",
            Notification::Welcome { .. } => "WELCOME",
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Notification::OrderCreated { email, .. } | Notification::Welcome { email, .. } => email,
        }
    }
}

/// Posts notifications in the background.
///
/// A dispatcher without a URL skips every notification. Failures are logged
/// and counted, never returned to the caller.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    client: reqwest::Client,
    url: Option<String>,
}

impl NotificationDispatcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a dispatcher. A blank URL disables dispatch.
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        Ok(Self { client, url })
    }

    /// A dispatcher that skips everything.
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Starts delivery and returns immediately.
    ///
    /// Returns the delivery task, or `None` when dispatch is disabled.
    pub fn dispatch(&self, notification: Notification) -> Option<JoinHandle<()>> {
        let kind = notification.kind();
        let Some(url) = self.url.clone() else {
            tracing::warn!(kind, email = notification.email(), "notification URL not configured, skipping");
            metrics::counter!("notifications_skipped_total", "kind" => kind).increment(1);
            return None;
        };

        tracing::info!(kind, email = notification.email(), "sending notification");
        let client = self.client.clone();
        Some(tokio::spawn(async move {
            match send(&client, &url, &notification).await {
                Ok(body) => {
                    tracing::info!(kind, email = notification.email(), response = %body, "notification sent");
                    metrics::counter!("notifications_sent_total", "kind" => kind).increment(1);
                }
                Err(error) => {
                    tracing::error!(kind, email = notification.email(), %error, "notification failed");
                    metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
                }
            }
        }))
    }
}

async fn send(client: &reqwest::Client, url: &str, notification: &Notification) -> Result<String> {
    let response = client.post(url).json(notification).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(NotificationError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
