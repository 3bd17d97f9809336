//! Kubernetes watch connections
//!
//! One connection per (cluster, collection path). Each connection subscribes
//! to the watch endpoint, forwards every event to the monitor, and
//! resubscribes whenever the stream ends, pacing attempts with a
//! `ReconnectPolicy`.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, WatchEvent, WatchParams};
use kube::{Api, Client};
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::kube_contexts::ClusterClient;
use crate::config::WatchConfig;
use crate::coordination::{policy_from_config, ReconnectPolicy, WatchOutcome};
use crate::domain::{EventType, ResourceEvent};
use crate::error::{KubesightError, Result};

/// A parsed collection path such as `/apis/postgresql.cnpg.io/v1/clusters`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    pub group: String,
    pub version: String,
    pub plural: String,
    pub namespace: Option<String>,
}

impl ApiPath {
    /// Parse a collection path
    ///
    /// - `/api/v1/pods`
    /// - `/api/v1/namespaces/default/pods`
    /// - `/apis/apps/v1/deployments`
    /// - `/apis/apps/v1/namespaces/default/deployments`
    pub fn parse(path: &str) -> Result<Self> {
        let parts: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();

        let (group, rest) = match parts.first() {
            Some(&"api") => ("", &parts[1..]),
            Some(&"apis") if parts.len() >= 2 => (parts[1], &parts[2..]),
            Some(other) => {
                return Err(KubesightError::api_path(
                    path,
                    format!("Unknown API prefix: {other}"),
                ))
            }
            None => return Err(KubesightError::api_path(path, "Empty path")),
        };

        let (version, namespace, plural) = match rest {
            [version, plural] => (*version, None, *plural),
            [version, "namespaces", ns, plural] => (*version, Some(ns.to_string()), *plural),
            _ => {
                return Err(KubesightError::api_path(
                    path,
                    "Expected <version>/<plural> or <version>/namespaces/<ns>/<plural>",
                ))
            }
        };

        Ok(Self {
            group: group.to_string(),
            version: version.to_string(),
            plural: plural.to_string(),
            namespace,
        })
    }

    /// Parse every configured path, failing on the first invalid one
    pub fn parse_all(paths: &[String]) -> Result<Vec<Self>> {
        paths.iter().map(|p| Self::parse(p)).collect()
    }

    pub fn api_resource(&self) -> ApiResource {
        // Kind is not part of the request URL; events carry their own
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, "");
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.group.is_empty() {
            "/api".to_string()
        } else {
            format!("/apis/{}", self.group)
        };
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/namespaces/{}/{}", prefix, self.version, ns, self.plural),
            None => write!(f, "{}/{}/{}", prefix, self.version, self.plural),
        }
    }
}

/// How a single subscription finished without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The server closed the stream
    Closed,
    /// Nobody is listening for events anymore
    ReceiverDropped,
}

/// A resubscribable event stream
#[async_trait]
pub trait WatchSource: Send + Sync {
    /// Subscribe once and forward events until the stream ends
    async fn stream_events(
        &self,
        cluster: &str,
        events: &mpsc::Sender<ResourceEvent>,
    ) -> Result<StreamEnd>;
}

/// Watch endpoint of the Kubernetes API
pub struct KubeWatchSource {
    api: Api<DynamicObject>,
    params: WatchParams,
}

impl KubeWatchSource {
    pub fn new(client: Client, path: &ApiPath) -> Self {
        let ar = path.api_resource();
        let api = match &path.namespace {
            Some(ns) => Api::namespaced_with(client, ns, &ar),
            None => Api::all_with(client, &ar),
        };
        Self {
            api,
            params: WatchParams::default(),
        }
    }
}

#[async_trait]
impl WatchSource for KubeWatchSource {
    async fn stream_events(
        &self,
        cluster: &str,
        events: &mpsc::Sender<ResourceEvent>,
    ) -> Result<StreamEnd> {
        let mut stream = self.api.watch(&self.params, "0").await?.boxed();

        while let Some(event) = stream.try_next().await? {
            let (event_type, resource) = match event {
                WatchEvent::Added(obj) => (EventType::Added, obj),
                WatchEvent::Modified(obj) => (EventType::Modified, obj),
                WatchEvent::Deleted(obj) => (EventType::Deleted, obj),
                WatchEvent::Bookmark(_) => continue,
                WatchEvent::Error(e) => {
                    warn!("Watch error event from {}: {:?}", cluster, e);
                    continue;
                }
            };

            if events
                .send(ResourceEvent::new(cluster, event_type, resource))
                .await
                .is_err()
            {
                return Ok(StreamEnd::ReceiverDropped);
            }
        }

        Ok(StreamEnd::Closed)
    }
}

/// Subscription loop for one (cluster, path)
pub struct WatchConnection {
    cluster: String,
    path: String,
    source: Box<dyn WatchSource>,
    policy: Box<dyn ReconnectPolicy>,
    events: mpsc::Sender<ResourceEvent>,
}

impl WatchConnection {
    pub fn new(
        cluster: &str,
        path: &str,
        source: Box<dyn WatchSource>,
        policy: Box<dyn ReconnectPolicy>,
        events: mpsc::Sender<ResourceEvent>,
    ) -> Self {
        Self {
            cluster: cluster.to_string(),
            path: path.to_string(),
            source,
            policy,
            events,
        }
    }

    /// Subscribe until the receiver goes away or the policy gives up.
    ///
    /// Returns the number of subscriptions made.
    pub async fn run(mut self) -> u64 {
        let mut subscriptions: u64 = 0;
        info!("{} -> watching api {}", self.cluster, self.path);

        loop {
            subscriptions += 1;
            let outcome = match self.source.stream_events(&self.cluster, &self.events).await {
                Ok(StreamEnd::ReceiverDropped) => break,
                Ok(StreamEnd::Closed) => {
                    debug!("{} -> watch stream {} ended", self.cluster, self.path);
                    WatchOutcome::Ended
                }
                Err(e) => {
                    warn!(
                        "{} -> watch stream {} failed (subscription {}): {}",
                        self.cluster, self.path, subscriptions, e
                    );
                    WatchOutcome::Failed
                }
            };

            if self.events.is_closed() {
                break;
            }

            match self.policy.next_delay(outcome) {
                None => {
                    warn!("{} -> giving up on watch {}", self.cluster, self.path);
                    break;
                }
                Some(delay) if delay.is_zero() => tokio::task::yield_now().await,
                Some(delay) => {
                    debug!("{} -> resubscribing to {} in {:?}", self.cluster, self.path, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        info!(
            "{} -> stopped watching {} after {} subscriptions",
            self.cluster, self.path, subscriptions
        );
        subscriptions
    }
}

/// Spawn one watch connection per (cluster, path)
pub fn spawn_watchers(
    clients: &[ClusterClient],
    paths: &[ApiPath],
    config: &WatchConfig,
    events: &mpsc::Sender<ResourceEvent>,
) -> Vec<JoinHandle<u64>> {
    let mut handles = Vec::with_capacity(clients.len() * paths.len());
    for cluster in clients {
        for path in paths {
            let connection = WatchConnection::new(
                &cluster.name,
                &path.to_string(),
                Box::new(KubeWatchSource::new(cluster.client.clone(), path)),
                policy_from_config(config),
                events.clone(),
            );
            handles.push(tokio::spawn(connection.run()));
        }
    }
    handles
}
