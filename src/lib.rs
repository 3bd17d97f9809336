pub mod adapters;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod services;
pub mod supervisor;

pub use cache::ResourceCache;
pub use config::AppConfig;
pub use coordination::{Debouncer, ReconnectPolicy};
pub use domain::{ResourceEvent, ResourceKey, StatusEvaluator, StatusRecord};
pub use error::{KubesightError, Result};
pub use services::Monitor;
pub use supervisor::{AlertManager, Notification, Notifier};
