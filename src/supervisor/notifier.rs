//! Outbound notification boundary

use async_trait::async_trait;
use tracing::debug;

use crate::domain::StatusRecord;
use crate::error::Result;

/// One `name: value` line of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
}

/// Alert or resolution message handed to a `Notifier`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub healthy: bool,
    pub title: String,
    pub fields: Vec<NotificationField>,
}

impl Notification {
    /// Build a notification carrying every status member in declaration order
    pub fn from_status(title: &str, status: &StatusRecord) -> Self {
        Self {
            healthy: status.is_ok(),
            title: title.to_string(),
            fields: status
                .fields()
                .into_iter()
                .map(|(name, value)| NotificationField {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }
    }
}

/// Delivers notifications to an external channel.
///
/// Callers log and drop errors; implementations must not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Notifier used when no webhook is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        debug!(
            "Notifications disabled, dropping '{}' ({} fields)",
            notification.title,
            notification.fields.len()
        );
        Ok(())
    }
}
