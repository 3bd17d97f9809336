//! Delay policies between watch re-subscriptions

use std::time::Duration;

use crate::config::{ReconnectMode, WatchConfig};

/// How the previous subscription ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Stream closed without error
    Ended,
    /// Subscribing or reading failed
    Failed,
}

/// Decides the delay before the next subscription attempt.
///
/// Returning `None` stops the watch loop.
pub trait ReconnectPolicy: Send {
    fn next_delay(&mut self, outcome: WatchOutcome) -> Option<Duration>;
}

/// Resubscribe right away, forever
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl ReconnectPolicy for Immediate {
    fn next_delay(&mut self, _outcome: WatchOutcome) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Doubling delay after consecutive failures, reset by a clean end
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&mut self, outcome: WatchOutcome) -> Option<Duration> {
        match outcome {
            WatchOutcome::Ended => {
                self.failures = 0;
                Some(Duration::ZERO)
            }
            WatchOutcome::Failed => {
                let factor = 1u32 << self.failures.min(16);
                self.failures = self.failures.saturating_add(1);
                Some(self.base.saturating_mul(factor).min(self.max))
            }
        }
    }
}

/// Build the policy selected in configuration
pub fn policy_from_config(config: &WatchConfig) -> Box<dyn ReconnectPolicy> {
    match config.reconnect {
        ReconnectMode::Immediate => Box::new(Immediate),
        ReconnectMode::Backoff => Box::new(ExponentialBackoff::new(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_immediate_never_waits() {
        let mut policy = Immediate;
        for _ in 0..100 {
            assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::ZERO));
        }
        assert_eq!(policy.next_delay(WatchOutcome::Ended), Some(Duration::ZERO));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut policy =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(500));

        assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::from_millis(400)));
        assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::from_millis(500)));
        for _ in 0..40 {
            assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::from_millis(500)));
        }
    }

    #[test]
    fn test_backoff_resets_after_clean_end() {
        let mut policy =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10));

        policy.next_delay(WatchOutcome::Failed);
        policy.next_delay(WatchOutcome::Failed);
        assert_eq!(policy.next_delay(WatchOutcome::Ended), Some(Duration::ZERO));
        assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = AppConfig::default_config().watch;
        let mut policy = policy_from_config(&config);
        assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::ZERO));

        config.reconnect = ReconnectMode::Backoff;
        config.backoff_base_ms = 250;
        let mut policy = policy_from_config(&config);
        assert_eq!(policy.next_delay(WatchOutcome::Failed), Some(Duration::from_millis(250)));
    }
}
