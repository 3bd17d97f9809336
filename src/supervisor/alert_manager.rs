//! Alert deduplication for CNPG cluster health
//!
//! Tracks which status fingerprints are currently alerting and turns each
//! reconciliation verdict into at most one alert or resolution notification.
//! The table is bounded by count (least-recently-used eviction) and by age.

use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::notifier::{Notification, Notifier};
use crate::config::AlertsConfig;
use crate::domain::StatusRecord;

pub const ALERT_TITLE: &str = "cnpgCluster alert";
pub const RESOLVED_TITLE: &str = "cnpgCluster alert resolved";

/// The resource an alert is about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertSubject {
    pub cluster: String,
    pub namespace: String,
    pub name: String,
}

impl AlertSubject {
    pub fn of(status: &StatusRecord) -> Self {
        Self {
            cluster: status.cluster.clone(),
            namespace: status.namespace.clone(),
            name: status.cnpg_cluster.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct AlertEntry {
    raised_at: Instant,
    subject: AlertSubject,
}

/// Fingerprints currently alerting
pub struct AlertStore {
    entries: LruCache<String, AlertEntry>,
    by_subject: HashMap<AlertSubject, HashSet<String>>,
    retention: Duration,
}

impl AlertStore {
    pub fn new(capacity: NonZeroUsize, retention: Duration) -> Self {
        Self {
            entries: LruCache::new(capacity),
            by_subject: HashMap::new(),
            retention,
        }
    }

    fn is_expired(&self, entry: &AlertEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.raised_at) >= self.retention
    }

    fn unindex(&mut self, fingerprint: &str, subject: &AlertSubject) {
        if let Some(fingerprints) = self.by_subject.get_mut(subject) {
            fingerprints.remove(fingerprint);
            if fingerprints.is_empty() {
                self.by_subject.remove(subject);
            }
        }
    }

    fn pop(&mut self, fingerprint: &str) -> Option<AlertEntry> {
        let entry = self.entries.pop(fingerprint)?;
        self.unindex(fingerprint, &entry.subject);
        Some(entry)
    }

    /// Whether `fingerprint` has a live entry; counts as a use
    pub fn contains(&mut self, fingerprint: &str, now: Instant) -> bool {
        let expired = match self.entries.get(fingerprint) {
            None => return false,
            Some(entry) => now.saturating_duration_since(entry.raised_at) >= self.retention,
        };

        if expired {
            self.pop(fingerprint);
            debug!("Alert fingerprint expired: {}", fingerprint);
            return false;
        }
        true
    }

    /// Record `fingerprint` as alerting from `now`
    pub fn insert(&mut self, fingerprint: String, subject: AlertSubject, now: Instant) {
        self.by_subject
            .entry(subject.clone())
            .or_default()
            .insert(fingerprint.clone());

        let entry = AlertEntry {
            raised_at: now,
            subject,
        };
        if let Some((evicted, old)) = self.entries.push(fingerprint.clone(), entry) {
            if evicted != fingerprint {
                warn!("Alert table full, evicted least recently used: {}", evicted);
                self.unindex(&evicted, &old.subject);
            }
        }
    }

    pub fn remove(&mut self, fingerprint: &str) -> bool {
        self.pop(fingerprint).is_some()
    }

    /// Remove every entry about `subject`, returning how many were still live
    pub fn remove_subject(&mut self, subject: &AlertSubject, now: Instant) -> usize {
        let Some(fingerprints) = self.by_subject.remove(subject) else {
            return 0;
        };

        let mut live = 0;
        for fingerprint in fingerprints {
            if let Some(entry) = self.entries.pop(&fingerprint) {
                if !self.is_expired(&entry, now) {
                    live += 1;
                }
            }
        }
        live
    }

    /// Drop every expired entry
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(fingerprint, _)| fingerprint.clone())
            .collect();

        for fingerprint in &expired {
            self.pop(fingerprint);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What an observation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// Healthy and nothing alerting
    Unchanged,
    /// New alert sent
    Raised,
    /// Alert already sent for this exact status
    Suppressed,
    /// Resolution sent
    Resolved,
}

/// Drives alert state transitions and dispatches notifications.
///
/// Deliveries run as background tasks; the caller never waits on the
/// webhook.
pub struct AlertManager {
    store: AlertStore,
    notifier: Arc<dyn Notifier>,
    deliveries: JoinSet<()>,
}

impl AlertManager {
    pub fn new(config: &AlertsConfig, notifier: Arc<dyn Notifier>) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: AlertStore::new(capacity, config.retention()),
            notifier,
            deliveries: JoinSet::new(),
        }
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    /// Apply one status verdict
    ///
    /// | healthy | alerting | action |
    /// |---|---|---|
    /// | yes | no  | nothing |
    /// | yes | yes | resolution, entries removed |
    /// | no  | no  | alert, entry inserted |
    /// | no  | yes | nothing |
    ///
    /// A healthy status never shares a fingerprint with the unhealthy one it
    /// resolves, so resolution looks entries up by subject.
    pub fn observe(&mut self, status: &StatusRecord, now: Instant) -> AlertTransition {
        if status.is_ok() {
            if self.store.remove_subject(&AlertSubject::of(status), now) == 0 {
                return AlertTransition::Unchanged;
            }

            info!(
                "{}: {}/{}/{} instances {}/{}",
                RESOLVED_TITLE,
                status.cluster,
                status.namespace,
                status.cnpg_cluster,
                status.instances_ready,
                status.instances_total
            );
            self.dispatch(Notification::from_status(RESOLVED_TITLE, status));
            return AlertTransition::Resolved;
        }

        let fingerprint = status.fingerprint();
        if self.store.contains(&fingerprint, now) {
            return AlertTransition::Suppressed;
        }

        error!(
            "{}: {}/{}/{} instances {} ({}/{}), base backup {}, archiving {}",
            ALERT_TITLE,
            status.cluster,
            status.namespace,
            status.cnpg_cluster,
            status.instances_status,
            status.instances_ready,
            status.instances_total,
            status.base_backup_status,
            status.archiving_status
        );
        self.store
            .insert(fingerprint, AlertSubject::of(status), now);
        self.dispatch(Notification::from_status(ALERT_TITLE, status));
        AlertTransition::Raised
    }

    /// Drop expired entries so the table does not hold stale incidents
    pub fn purge_expired(&mut self, now: Instant) {
        let purged = self.store.purge_expired(now);
        if purged > 0 {
            debug!("Purged {} expired alert fingerprints", purged);
        }
    }

    /// Notifications still being delivered
    pub fn pending_deliveries(&self) -> usize {
        self.deliveries.len()
    }

    /// Wait for every in-flight notification to finish
    pub async fn drain_deliveries(&mut self) {
        while let Some(result) = self.deliveries.join_next().await {
            if let Err(e) = result {
                warn!("Notification task failed: {}", e);
            }
        }
    }

    fn reap_deliveries(&mut self) {
        while let Some(result) = self.deliveries.try_join_next() {
            if let Err(e) = result {
                warn!("Notification task failed: {}", e);
            }
        }
    }

    fn dispatch(&mut self, notification: Notification) {
        self.reap_deliveries();

        let notifier = Arc::clone(&self.notifier);
        self.deliveries.spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                error!("Failed to send '{}' notification: {}", notification.title, e);
            }
        });
    }
}
