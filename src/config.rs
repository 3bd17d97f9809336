use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{KubesightError, Result};

/// Contexts watched when no allow-list is configured
pub const DEFAULT_CONTEXTS: &[&str] = &["dev", "prod", "ovh-dev", "ovh-prod"];

/// Collection path for CloudNativePG clusters
pub const CNPG_CLUSTERS_PATH: &str = "/apis/postgresql.cnpg.io/v1/clusters";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub watch: WatchConfig,
    pub debounce: DebounceConfig,
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub mattermost: MattermostConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Kubeconfig context names allowed to be watched
    pub contexts: Vec<String>,
    /// Collection paths subscribed to on every cluster
    pub api_paths: Vec<String>,
    /// Delay policy between re-subscriptions
    #[serde(default)]
    pub reconnect: ReconnectMode,
    /// Base delay for `backoff` mode
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Delay ceiling for `backoff` mode
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Capacity of the event channel between watchers and the monitor
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_event_buffer() -> usize {
    1024
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectMode {
    /// Resubscribe as soon as a stream ends
    #[default]
    Immediate,
    /// Exponential delay between attempts, reset after a clean end
    Backoff,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period after the latest trigger
    pub quiet_period_ms: u64,
    /// Upper bound measured from the first trigger of a burst
    pub max_wait_ms: u64,
}

impl DebounceConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 1000,
            max_wait_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Maximum number of fingerprints kept alerting
    pub capacity: usize,
    /// Seconds before an alerting fingerprint expires
    pub retention_secs: u64,
    /// Age after which the last successful base backup counts as failed
    #[serde(default = "default_max_backup_age_hours")]
    pub max_backup_age_hours: i64,
}

fn default_max_backup_age_hours() -> i64 {
    26
}

/// Upper bound accepted for `alerts.max_backup_age_hours`
pub const MAX_BACKUP_AGE_HOURS_LIMIT: i64 = 24 * 365;

impl AlertsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Backup age threshold, clamped to `1..=MAX_BACKUP_AGE_HOURS_LIMIT` hours
    pub fn max_backup_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_backup_age_hours.clamp(1, MAX_BACKUP_AGE_HOURS_LIMIT))
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            capacity: 2000,
            retention_secs: 60 * 60 * 24,
            max_backup_age_hours: default_max_backup_age_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MattermostConfig {
    /// Incoming webhook URL; notifications are disabled when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Channel posted to, required with `webhook_url`
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    /// Per-request timeout for webhook posts
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_author_name() -> String {
    "kubesight-alerts".to_string()
}

impl Default for MattermostConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            channel: None,
            author_name: default_author_name(),
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();

        let builder = Self::defaults()?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("KUBESIGHT_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (KUBESIGHT__WATCH__CONTEXTS, etc.)
            .add_source(
                Environment::with_prefix("KUBESIGHT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("watch.contexts")
                    .with_list_parse_key("watch.api_paths")
                    .try_parsing(true),
            )
            // Deployments predating the prefixed variables
            .set_override_option(
                "mattermost.webhook_url",
                non_empty_env("MATTERMOST_WEBHOOK_URL"),
            )?
            .set_override_option("mattermost.channel", non_empty_env("MATTERMOST_CHANNEL"))?;

        Ok(builder.build()?.try_deserialize()?)
    }

    fn defaults() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        let contexts: Vec<String> = DEFAULT_CONTEXTS.iter().map(|c| c.to_string()).collect();
        Config::builder()
            .set_default("watch.contexts", contexts)?
            .set_default("watch.api_paths", vec![CNPG_CLUSTERS_PATH.to_string()])?
            .set_default("watch.reconnect", "immediate")?
            .set_default("debounce.quiet_period_ms", 1000)?
            .set_default("debounce.max_wait_ms", 1000)?
            .set_default("alerts.capacity", 2000)?
            .set_default("alerts.retention_secs", 60 * 60 * 24)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)
    }

    /// Built-in configuration, used by tests and as a fallback
    pub fn default_config() -> Self {
        Self {
            watch: WatchConfig {
                contexts: DEFAULT_CONTEXTS.iter().map(|c| c.to_string()).collect(),
                api_paths: vec![CNPG_CLUSTERS_PATH.to_string()],
                reconnect: ReconnectMode::Immediate,
                backoff_base_ms: default_backoff_base_ms(),
                backoff_max_ms: default_backoff_max_ms(),
                event_buffer: default_event_buffer(),
            },
            debounce: DebounceConfig::default(),
            alerts: AlertsConfig::default(),
            mattermost: MattermostConfig::default(),
            logging: LoggingConfig {
                level: default_log_level(),
                json: false,
                dir: None,
            },
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(url) = &self.mattermost.webhook_url {
            if self.mattermost.channel.as_deref().unwrap_or("").is_empty() {
                errors.push(
                    "mattermost.webhook_url is defined so mattermost.channel is required"
                        .to_string(),
                );
            }
            if let Err(e) = url::Url::parse(url) {
                errors.push(format!("mattermost.webhook_url is not a valid URL: {e}"));
            }
        }

        if self.watch.contexts.is_empty() {
            errors.push("watch.contexts must list at least one context".to_string());
        }

        if self.watch.api_paths.is_empty() {
            errors.push("watch.api_paths must list at least one path".to_string());
        }

        if self.watch.event_buffer == 0 {
            errors.push("watch.event_buffer must be positive".to_string());
        }

        if self.debounce.quiet_period_ms == 0 || self.debounce.max_wait_ms == 0 {
            errors.push("debounce windows must be positive".to_string());
        }

        if self.mattermost.timeout_secs == 0 {
            errors.push("mattermost.timeout_secs must be positive".to_string());
        }

        if self.alerts.capacity == 0 {
            errors.push("alerts.capacity must be positive".to_string());
        }

        if !(1..=MAX_BACKUP_AGE_HOURS_LIMIT).contains(&self.alerts.max_backup_age_hours) {
            errors.push(format!(
                "alerts.max_backup_age_hours must be between 1 and {}",
                MAX_BACKUP_AGE_HOURS_LIMIT
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(KubesightError::InvalidConfig(errors.join("; ")))
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
