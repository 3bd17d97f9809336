//! Mattermost incoming-webhook notifications
//!
//! Posts alert and resolution attachments to a Mattermost channel.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MattermostConfig;
use crate::error::{KubesightError, Result};
use crate::supervisor::{NoopNotifier, Notification, Notifier};

const COLOR_HEALTHY: &str = "#00FF00";
const COLOR_UNHEALTHY: &str = "#FF0000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Mattermost notification client
#[derive(Clone)]
pub struct MattermostNotifier {
    client: Client,
    webhook_url: String,
    channel: String,
    author_name: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
pub struct MattermostMessage {
    pub channel: String,
    pub author_name: String,
    pub attachments: Vec<MattermostAttachment>,
}

#[derive(Debug, Serialize)]
pub struct MattermostAttachment {
    pub color: &'static str,
    pub title: String,
    pub fields: Vec<MattermostField>,
}

#[derive(Debug, Serialize)]
pub struct MattermostField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl MattermostNotifier {
    /// Create a notifier with explicit settings
    pub fn new(webhook_url: String, channel: String, author_name: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
            channel,
            author_name,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a notifier when a webhook is configured
    pub fn from_config(config: &MattermostConfig) -> Option<Self> {
        let url = config.webhook_url.clone()?;
        let channel = config.channel.clone()?;
        Some(
            Self::new(url, channel, config.author_name.clone())
                .with_timeout(Duration::from_secs(config.timeout_secs)),
        )
    }

    /// Build the webhook payload for a notification
    pub fn message(&self, notification: &Notification) -> MattermostMessage {
        MattermostMessage {
            channel: self.channel.clone(),
            author_name: self.author_name.clone(),
            attachments: vec![MattermostAttachment {
                color: if notification.healthy {
                    COLOR_HEALTHY
                } else {
                    COLOR_UNHEALTHY
                },
                title: notification.title.clone(),
                fields: notification
                    .fields
                    .iter()
                    .map(|field| MattermostField {
                        title: field.name.clone(),
                        value: field.value.clone(),
                        short: true,
                    })
                    .collect(),
            }],
        }
    }
}

#[async_trait]
impl Notifier for MattermostNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let message = self.message(notification);

        let resp = self
            .client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&message)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!("Mattermost notification sent successfully");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(KubesightError::NotificationRejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Pick the notifier for this configuration
pub fn notifier_from_config(config: &MattermostConfig) -> Arc<dyn Notifier> {
    match MattermostNotifier::from_config(config) {
        Some(notifier) => {
            info!("Mattermost notifications enabled for channel {}", notifier.channel);
            Arc::new(notifier)
        }
        None => {
            info!("MATTERMOST_WEBHOOK_URL not configured");
            Arc::new(NoopNotifier)
        }
    }
}
