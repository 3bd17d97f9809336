//! Kubeconfig context resolution
//!
//! Builds one API client per allowed context found in the local kubeconfig.

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{info, warn};

use crate::error::{KubesightError, Result};

/// API client bound to one kubeconfig context
#[derive(Clone)]
pub struct ClusterClient {
    pub name: String,
    pub client: Client,
}

/// Allowed contexts present in `available`, in kubeconfig order
pub fn select_contexts(available: &[String], allowed: &[String]) -> Vec<String> {
    available
        .iter()
        .filter(|name| allowed.contains(name))
        .cloned()
        .collect()
}

/// Context names declared in the default kubeconfig
pub fn kubeconfig_contexts(kubeconfig: &Kubeconfig) -> Vec<String> {
    kubeconfig
        .contexts
        .iter()
        .map(|context| context.name.clone())
        .collect()
}

/// Create clients for every allowed context of the default kubeconfig.
///
/// Contexts that fail to load are skipped; an empty result is an error.
pub async fn resolve_clients(allowed: &[String]) -> Result<Vec<ClusterClient>> {
    let kubeconfig = Kubeconfig::read()?;
    let selected = select_contexts(&kubeconfig_contexts(&kubeconfig), allowed);

    let mut clients = Vec::with_capacity(selected.len());
    for name in selected {
        let options = KubeConfigOptions {
            context: Some(name.clone()),
            ..Default::default()
        };

        let config = match Config::from_custom_kubeconfig(kubeconfig.clone(), &options).await {
            Ok(config) => config,
            Err(e) => {
                warn!("Skipping kube context {}: {}", name, e);
                continue;
            }
        };

        match Client::try_from(config) {
            Ok(client) => {
                info!("Loaded kube context {}", name);
                clients.push(ClusterClient { name, client });
            }
            Err(e) => warn!("Skipping kube context {}: {}", name, e),
        }
    }

    if clients.is_empty() {
        return Err(KubesightError::NoClusterContexts {
            allowed: allowed.to_vec(),
        });
    }
    Ok(clients)
}
