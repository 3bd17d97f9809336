pub mod event_processor;
pub mod monitor;

pub use event_processor::{apply_event, resource_key};
pub use monitor::{Monitor, MonitorStats, ReconcileSummary};
