//! Watch event and cache key types shared by the watch and monitor layers.

use kube::api::DynamicObject;
use std::fmt;

/// Namespace assumed for resources that carry none
pub const DEFAULT_NAMESPACE: &str = "default";

/// Kubernetes watch event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single event delivered by a watch connection
#[derive(Debug, Clone)]
pub struct ResourceEvent {
    pub cluster: String,
    pub event_type: EventType,
    pub resource: DynamicObject,
}

impl ResourceEvent {
    pub fn new(cluster: &str, event_type: EventType, resource: DynamicObject) -> Self {
        Self {
            cluster: cluster.to_string(),
            event_type,
            resource,
        }
    }
}

/// Location of a snapshot in the resource cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub cluster: String,
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(cluster: &str, namespace: &str, kind: &str, name: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.cluster, self.namespace, self.kind, self.name
        )
    }
}
