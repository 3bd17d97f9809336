//! Reconciliation actor
//!
//! The monitor exclusively owns the resource cache, the debouncer and the
//! alert table. It handles one watch event or one debounce expiry at a time,
//! so none of that state needs locking. Watch connections only send events
//! into its channel.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::event_processor::apply_event;
use crate::cache::ResourceCache;
use crate::config::AppConfig;
use crate::coordination::Debouncer;
use crate::domain::{CnpgAggregator, DomainAggregator, ResourceEvent, StatusEvaluator};
use crate::supervisor::{AlertManager, AlertTransition, Notifier};

/// Counters kept by the monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub events_applied: u64,
    pub events_rejected: u64,
    pub reconciliations: u64,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub records: usize,
    pub raised: usize,
    pub resolved: usize,
    pub suppressed: usize,
}

pub struct Monitor {
    cache: ResourceCache,
    debouncer: Debouncer,
    aggregator: Box<dyn DomainAggregator>,
    evaluator: StatusEvaluator,
    alerts: AlertManager,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            cache: ResourceCache::new(),
            debouncer: Debouncer::new(config.debounce.quiet_period(), config.debounce.max_wait()),
            aggregator: Box::new(CnpgAggregator),
            evaluator: StatusEvaluator::new(config.alerts.max_backup_age()),
            alerts: AlertManager::new(&config.alerts, notifier),
            stats: MonitorStats::default(),
        }
    }

    /// Replace the domain aggregator
    pub fn with_aggregator(mut self, aggregator: Box<dyn DomainAggregator>) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Apply one watch event and schedule a reconciliation if it was valid
    pub fn handle_event(&mut self, event: ResourceEvent, now: Instant) -> bool {
        let event_type = event.event_type;
        match apply_event(&mut self.cache, event) {
            Ok(key) => {
                debug!("{} {}", event_type, key);
                self.stats.events_applied += 1;
                self.debouncer.trigger(now);
                true
            }
            Err(e) => {
                warn!("Discarding {} event: {}", event_type, e);
                self.stats.events_rejected += 1;
                false
            }
        }
    }

    /// Evaluate every CNPG cluster in the cache and drive alert transitions
    pub fn reconcile(&mut self) -> ReconcileSummary {
        let now = Instant::now();
        let wall_clock = Utc::now();
        self.alerts.purge_expired(now);

        let views = self.aggregator.aggregate(&self.cache);
        let mut summary = ReconcileSummary::default();

        for cluster in &views {
            for namespace in &cluster.namespaces {
                for record in &namespace.cnpg_clusters {
                    let status = self.evaluator.evaluate(&cluster.name, record, wall_clock);
                    summary.records += 1;
                    match self.alerts.observe(&status, now) {
                        AlertTransition::Raised => summary.raised += 1,
                        AlertTransition::Resolved => summary.resolved += 1,
                        AlertTransition::Suppressed => summary.suppressed += 1,
                        AlertTransition::Unchanged => {}
                    }
                }
            }
        }

        self.stats.reconciliations += 1;
        debug!(
            "Reconciled {} cnpg clusters: {} raised, {} resolved, {} suppressed",
            summary.records, summary.raised, summary.resolved, summary.suppressed
        );
        summary
    }

    /// Process events until every sender is dropped.
    ///
    /// A pending reconciliation runs before returning, and in-flight
    /// notifications are awaited.
    pub async fn run(mut self, mut events: mpsc::Receiver<ResourceEvent>) -> Self {
        info!("Monitor started");

        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event, Instant::now());
                    }
                    None => {
                        if self.debouncer.flush() {
                            self.reconcile();
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.debouncer.fire(Instant::now()) {
                        self.reconcile();
                    }
                }
            }
        }

        self.alerts.drain_deliveries().await;
        info!(
            "Monitor stopped: {} events applied, {} rejected, {} reconciliations",
            self.stats.events_applied, self.stats.events_rejected, self.stats.reconciliations
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::cnpg_cluster;
    use crate::domain::{ClusterView, EventType};
    use crate::supervisor::NoopNotifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingAggregator(Arc<AtomicUsize>);

    impl DomainAggregator for CountingAggregator {
        fn aggregate(&self, _cache: &ResourceCache) -> Vec<ClusterView> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }

    fn event(name: &str) -> ResourceEvent {
        ResourceEvent::new("prod", EventType::Modified, cnpg_cluster(name, "db", Some(1), 1))
    }

    fn counting_monitor() -> (Monitor, Arc<AtomicUsize>) {
        let passes = Arc::new(AtomicUsize::new(0));
        let monitor = Monitor::new(&AppConfig::default_config(), Arc::new(NoopNotifier))
            .with_aggregator(Box::new(CountingAggregator(passes.clone())));
        (monitor, passes)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_pass_within_max_wait() {
        let (monitor, passes) = counting_monitor();
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(monitor.run(rx));

        for i in 0..4 {
            if i > 0 {
                tokio::time::advance(Duration::from_millis(300)).await;
            }
            tx.send(event(&format!("pg{i}"))).await.unwrap();
            settle().await;
        }
        // First trigger at 0ms, last at 900ms
        assert_eq!(passes.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(99)).await;
        settle().await;
        assert_eq!(passes.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(passes.load(Ordering::SeqCst), 1);

        drop(tx);
        let monitor = handle.await.unwrap();
        assert_eq!(monitor.stats().reconciliations, 1);
        assert_eq!(monitor.stats().events_applied, 4);
        assert_eq!(monitor.cache().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_reconcile_separately() {
        let (monitor, passes) = counting_monitor();
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(monitor.run(rx));

        tx.send(event("pg1")).await.unwrap();
        settle().await;
        tokio::time::advance(Duration::from_millis(1500)).await;
        settle().await;
        assert_eq!(passes.load(Ordering::SeqCst), 1);

        tx.send(event("pg2")).await.unwrap();
        settle().await;
        tokio::time::advance(Duration::from_millis(1500)).await;
        settle().await;
        assert_eq!(passes.load(Ordering::SeqCst), 2);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_event_does_not_trigger() {
        let (monitor, passes) = counting_monitor();
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(monitor.run(rx));

        let mut nameless = event("pg1");
        nameless.resource.metadata.name = None;
        tx.send(nameless).await.unwrap();
        settle().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;

        drop(tx);
        let monitor = handle.await.unwrap();
        assert_eq!(passes.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.stats().events_rejected, 1);
        assert!(monitor.cache().is_empty());
    }

    #[tokio::test]
    async fn test_pending_trigger_flushed_on_close() {
        let (mut monitor, passes) = counting_monitor();
        assert!(monitor.handle_event(event("pg1"), Instant::now()));
        assert!(monitor.debouncer().is_pending());

        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let monitor = monitor.run(rx).await;

        assert_eq!(passes.load(Ordering::SeqCst), 1);
        assert!(!monitor.debouncer().is_pending());
    }

    #[tokio::test]
    async fn test_reconcile_summarizes_transitions() {
        let mut monitor = Monitor::new(&AppConfig::default_config(), Arc::new(NoopNotifier));
        let now = Instant::now();

        monitor.handle_event(
            ResourceEvent::new("prod", EventType::Added, cnpg_cluster("pg1", "db", Some(2), 3)),
            now,
        );
        monitor.handle_event(
            ResourceEvent::new("prod", EventType::Added, cnpg_cluster("pg2", "db", Some(3), 3)),
            now,
        );

        let first = monitor.reconcile();
        assert_eq!(first.records, 2);
        assert_eq!(first.raised, 1);

        let second = monitor.reconcile();
        assert_eq!(second.suppressed, 1);
        assert_eq!(second.raised, 0);
        assert_eq!(monitor.alerts().store().len(), 1);
    }
}
