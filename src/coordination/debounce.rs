//! Trigger coalescing with a quiet period and a max wait
//!
//! Bursts of triggers collapse into one firing. The firing happens once the
//! quiet period passes without a new trigger, or once the max wait since the
//! first trigger of the burst passes, whichever comes first.

use std::time::Duration;
use tokio::time::Instant;

/// Debounce state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// No trigger pending
    Idle,
    /// A burst is in progress
    Pending {
        first_trigger: Instant,
        last_trigger: Instant,
    },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet_period: Duration,
    max_wait: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(quiet_period: Duration, max_wait: Duration) -> Self {
        Self {
            quiet_period,
            max_wait,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }

    /// Record a trigger at `now`
    pub fn trigger(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Idle => DebounceState::Pending {
                first_trigger: now,
                last_trigger: now,
            },
            DebounceState::Pending { first_trigger, .. } => DebounceState::Pending {
                first_trigger,
                last_trigger: now,
            },
        };
    }

    /// Instant at which the pending burst fires, if any
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending {
                first_trigger,
                last_trigger,
            } => Some(std::cmp::min(
                last_trigger + self.quiet_period,
                first_trigger + self.max_wait,
            )),
        }
    }

    /// Return to idle and report `true` if the deadline has passed at `now`
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Return to idle and report whether a burst was pending
    pub fn flush(&mut self) -> bool {
        let pending = self.is_pending();
        self.state = DebounceState::Idle;
        pending
    }
}
