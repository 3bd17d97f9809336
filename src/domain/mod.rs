pub mod cnpg;
pub mod resource;
pub mod status;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cnpg::{ClusterView, CnpgAggregator, CnpgCluster, CnpgClusterStatus, DomainAggregator, NamespaceView};
pub use resource::{EventType, ResourceEvent, ResourceKey, DEFAULT_NAMESPACE};
pub use status::{CheckStatus, StatusEvaluator, StatusRecord};
