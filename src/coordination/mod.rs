//! Timing primitives for the watch and reconciliation loops
//!
//! - Debouncer coalescing reconciliation triggers
//! - Reconnect policies for watch re-subscription

pub mod debounce;
pub mod reconnect;

pub use debounce::{DebounceState, Debouncer};
pub use reconnect::{
    policy_from_config, ExponentialBackoff, Immediate, ReconnectPolicy, WatchOutcome,
};
