//! Local snapshot store of watched resources
//!
//! Holds the latest snapshot per (cluster, namespace, kind, name). The monitor
//! owns the only instance; nothing else mutates it.

use kube::api::DynamicObject;
use std::collections::BTreeMap;

use crate::domain::ResourceKey;

type NameMap = BTreeMap<String, DynamicObject>;
type KindMap = BTreeMap<String, NameMap>;
type NamespaceMap = BTreeMap<String, KindMap>;

/// Cluster → Namespace → Kind → Name → snapshot
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    clusters: BTreeMap<String, NamespaceMap>,
    len: usize,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `resource` at `key`, replacing any previous snapshot
    pub fn upsert(&mut self, key: &ResourceKey, resource: DynamicObject) -> Option<DynamicObject> {
        let previous = self
            .clusters
            .entry(key.cluster.clone())
            .or_default()
            .entry(key.namespace.clone())
            .or_default()
            .entry(key.kind.clone())
            .or_default()
            .insert(key.name.clone(), resource);

        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Remove the snapshot at `key`, pruning maps left empty
    pub fn remove(&mut self, key: &ResourceKey) -> Option<DynamicObject> {
        let namespaces = self.clusters.get_mut(&key.cluster)?;
        let kinds = namespaces.get_mut(&key.namespace)?;
        let names = kinds.get_mut(&key.kind)?;
        let removed = names.remove(&key.name)?;
        self.len -= 1;

        if names.is_empty() {
            kinds.remove(&key.kind);
        }
        if kinds.is_empty() {
            namespaces.remove(&key.namespace);
        }
        if namespaces.is_empty() {
            self.clusters.remove(&key.cluster);
        }

        Some(removed)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&DynamicObject> {
        self.clusters
            .get(&key.cluster)?
            .get(&key.namespace)?
            .get(&key.kind)?
            .get(&key.name)
    }

    /// Clusters holding at least one snapshot, sorted
    pub fn clusters(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }

    /// Namespaces of `cluster` holding at least one snapshot, sorted
    pub fn namespaces<'a>(&'a self, cluster: &str) -> impl Iterator<Item = &'a str> {
        self.clusters
            .get(cluster)
            .into_iter()
            .flat_map(|namespaces| namespaces.keys().map(String::as_str))
    }

    /// Snapshots of `kind` in `cluster`/`namespace`, sorted by name
    pub fn resources<'a>(
        &'a self,
        cluster: &str,
        namespace: &str,
        kind: &str,
    ) -> impl Iterator<Item = &'a DynamicObject> {
        self.clusters
            .get(cluster)
            .and_then(|namespaces| namespaces.get(namespace))
            .and_then(|kinds| kinds.get(kind))
            .into_iter()
            .flat_map(|names| names.values())
    }

    /// Total number of snapshots
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::cnpg_cluster;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new("prod", "db", "Cluster", name)
    }

    #[test]
    fn test_upsert_overwrites_single_snapshot() {
        let mut cache = ResourceCache::new();

        assert!(cache.upsert(&key("pg1"), cnpg_cluster("pg1", "db", Some(2), 3)).is_none());
        let previous = cache.upsert(&key("pg1"), cnpg_cluster("pg1", "db", Some(3), 3));

        assert!(previous.is_some());
        assert_eq!(cache.len(), 1);
        let stored = cache.get(&key("pg1")).unwrap();
        assert_eq!(stored.data["status"]["readyInstances"], 3);
    }

    #[test]
    fn test_remove_prunes_empty_maps() {
        let mut cache = ResourceCache::new();
        cache.upsert(&key("pg1"), cnpg_cluster("pg1", "db", Some(3), 3));

        assert!(cache.remove(&key("pg1")).is_some());
        assert!(cache.is_empty());
        assert_eq!(cache.clusters().count(), 0);
        assert_eq!(cache.namespaces("prod").count(), 0);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut cache = ResourceCache::new();
        cache.upsert(&key("pg1"), cnpg_cluster("pg1", "db", Some(3), 3));

        assert!(cache.remove(&key("pg2")).is_none());
        assert!(cache
            .remove(&ResourceKey::new("dev", "db", "Cluster", "pg1"))
            .is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let mut cache = ResourceCache::new();
        cache.upsert(&ResourceKey::new("prod", "web", "Cluster", "b"), cnpg_cluster("b", "web", None, 1));
        cache.upsert(&ResourceKey::new("prod", "db", "Cluster", "z"), cnpg_cluster("z", "db", None, 1));
        cache.upsert(&ResourceKey::new("prod", "db", "Cluster", "a"), cnpg_cluster("a", "db", None, 1));
        cache.upsert(&ResourceKey::new("dev", "db", "Cluster", "a"), cnpg_cluster("a", "db", None, 1));

        assert_eq!(cache.clusters().collect::<Vec<_>>(), vec!["dev", "prod"]);
        assert_eq!(cache.namespaces("prod").collect::<Vec<_>>(), vec!["db", "web"]);
        let names: Vec<_> = cache
            .resources("prod", "db", "Cluster")
            .filter_map(|r| r.metadata.name.as_deref())
            .collect();
        assert_eq!(names, vec!["a", "z"]);
        assert_eq!(cache.resources("prod", "db", "Pod").count(), 0);
    }
}
