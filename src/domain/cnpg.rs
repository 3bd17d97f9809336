//! Typed view of CloudNativePG clusters held in the resource cache.

use chrono::{DateTime, Utc};
use kube::api::DynamicObject;
use serde::Deserialize;
use tracing::debug;

use crate::cache::ResourceCache;
use crate::error::{KubesightError, Result};

/// API group of CloudNativePG resources
pub const CNPG_GROUP: &str = "postgresql.cnpg.io";

/// Kind of CloudNativePG cluster resources
pub const CNPG_CLUSTER_KIND: &str = "Cluster";

/// Condition reported by the operator while WAL archiving works
pub const CONTINUOUS_ARCHIVING_CONDITION: &str = "ContinuousArchiving";

/// A CNPG cluster resource, reduced to the fields health checks need
#[derive(Debug, Clone, PartialEq)]
pub struct CnpgCluster {
    pub name: String,
    pub namespace: String,
    /// Whether `spec.backup` is configured
    pub backup_configured: bool,
    pub status: CnpgClusterStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CnpgClusterStatus {
    pub instances: i64,
    #[serde(default)]
    pub ready_instances: Option<i64>,
    #[serde(default)]
    pub last_successful_backup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_failed_backup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
}

impl CnpgClusterStatus {
    pub fn condition(&self, type_: &str) -> Option<&StatusCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

impl CnpgCluster {
    /// Whether a cached object is a CNPG cluster
    pub fn matches(resource: &DynamicObject) -> bool {
        resource.types.as_ref().is_some_and(|types| {
            types.kind == CNPG_CLUSTER_KIND
                && types
                    .api_version
                    .split_once('/')
                    .is_some_and(|(group, _)| group == CNPG_GROUP)
        })
    }

    /// Build the typed record from a cached snapshot
    pub fn from_resource(namespace: &str, resource: &DynamicObject) -> Result<Self> {
        let name = resource
            .metadata
            .name
            .clone()
            .ok_or_else(|| KubesightError::InvalidResource("cnpg cluster without name".into()))?;

        let status = resource.data.get("status").cloned().ok_or_else(|| {
            KubesightError::InvalidResource(format!("cnpg cluster {name} has no status"))
        })?;
        let status: CnpgClusterStatus = serde_json::from_value(status)?;

        let backup_configured = resource
            .data
            .pointer("/spec/backup")
            .is_some_and(|backup| !backup.is_null());

        Ok(Self {
            name,
            namespace: namespace.to_string(),
            backup_configured,
            status,
        })
    }
}

/// Per-cluster domain records
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterView {
    pub name: String,
    pub namespaces: Vec<NamespaceView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceView {
    pub name: String,
    pub cnpg_clusters: Vec<CnpgCluster>,
}

/// Turns raw cache contents into typed per-namespace records.
///
/// Called synchronously by the reconciliation pass, so the result always
/// reflects the cache at call time.
pub trait DomainAggregator: Send {
    fn aggregate(&self, cache: &ResourceCache) -> Vec<ClusterView>;
}

/// Aggregator extracting CNPG clusters
#[derive(Debug, Clone, Copy, Default)]
pub struct CnpgAggregator;

impl DomainAggregator for CnpgAggregator {
    fn aggregate(&self, cache: &ResourceCache) -> Vec<ClusterView> {
        cache
            .clusters()
            .map(|cluster| {
                let namespaces = cache
                    .namespaces(cluster)
                    .filter_map(|namespace| {
                        let cnpg_clusters: Vec<CnpgCluster> = cache
                            .resources(cluster, namespace, CNPG_CLUSTER_KIND)
                            .filter(|resource| CnpgCluster::matches(resource))
                            .filter_map(|resource| {
                                match CnpgCluster::from_resource(namespace, resource) {
                                    Ok(record) => Some(record),
                                    Err(e) => {
                                        debug!(
                                            "Skipping cnpg cluster in {}/{}: {}",
                                            cluster, namespace, e
                                        );
                                        None
                                    }
                                }
                            })
                            .collect();

                        (!cnpg_clusters.is_empty()).then(|| NamespaceView {
                            name: namespace.to_string(),
                            cnpg_clusters,
                        })
                    })
                    .collect();

                ClusterView {
                    name: cluster.to_string(),
                    namespaces,
                }
            })
            .collect()
    }
}
