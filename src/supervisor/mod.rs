//! Alerting layer
//!
//! - Alert manager deduplicating CNPG health verdicts
//! - Notifier boundary for outbound delivery

pub mod alert_manager;
pub mod notifier;

pub use alert_manager::{
    AlertManager, AlertStore, AlertSubject, AlertTransition, ALERT_TITLE, RESOLVED_TITLE,
};
pub use notifier::{NoopNotifier, Notification, NotificationField, Notifier};
