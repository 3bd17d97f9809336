use thiserror::Error;

/// Main error type for the alerting service
#[derive(Error, Debug)]
pub enum KubesightError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Kubernetes errors
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("No kube context found (allowed: {allowed:?})")]
    NoClusterContexts { allowed: Vec<String> },

    #[error("Invalid API path '{path}': {reason}")]
    InvalidApiPath { path: String, reason: String },

    // Watch event errors
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification rejected: HTTP {status}: {body}")]
    NotificationRejected { status: u16, body: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for KubesightError
pub type Result<T> = std::result::Result<T, KubesightError>;

impl KubesightError {
    /// Build an `InvalidApiPath` error
    pub fn api_path(path: &str, reason: impl Into<String>) -> Self {
        KubesightError::InvalidApiPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
