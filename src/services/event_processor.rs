//! Applies watch events to the resource cache

use kube::api::DynamicObject;

use crate::cache::ResourceCache;
use crate::domain::{EventType, ResourceEvent, ResourceKey, DEFAULT_NAMESPACE};
use crate::error::{KubesightError, Result};

/// Cache key for `resource`, or an error if it lacks a kind or a name
pub fn resource_key(cluster: &str, resource: &DynamicObject) -> Result<ResourceKey> {
    let kind = resource
        .types
        .as_ref()
        .map(|types| types.kind.as_str())
        .filter(|kind| !kind.is_empty());
    let name = resource
        .metadata
        .name
        .as_deref()
        .filter(|name| !name.is_empty());

    match (kind, name) {
        (Some(kind), Some(name)) => {
            let namespace = resource
                .metadata
                .namespace
                .as_deref()
                .filter(|ns| !ns.is_empty())
                .unwrap_or(DEFAULT_NAMESPACE);
            Ok(ResourceKey::new(cluster, namespace, kind, name))
        }
        _ => Err(KubesightError::InvalidResource(format!(
            "kube resource missing kind or metadata name (cluster {cluster}, kind {kind:?}, name {name:?})"
        ))),
    }
}

/// Validate `event` and apply it to `cache`.
///
/// ADDED and MODIFIED store the full payload; DELETED removes the entry if it
/// exists. An invalid event leaves the cache untouched and returns an error.
pub fn apply_event(cache: &mut ResourceCache, event: ResourceEvent) -> Result<ResourceKey> {
    let key = resource_key(&event.cluster, &event.resource)?;

    match event.event_type {
        EventType::Added | EventType::Modified => {
            cache.upsert(&key, event.resource);
        }
        EventType::Deleted => {
            cache.remove(&key);
        }
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::{cnpg_cluster, object};
    use serde_json::json;

    fn event(event_type: EventType, resource: DynamicObject) -> ResourceEvent {
        ResourceEvent::new("prod", event_type, resource)
    }

    #[test]
    fn test_added_and_modified_store_payload() {
        let mut cache = ResourceCache::new();

        let added = cnpg_cluster("pg1", "db", Some(2), 3);
        let key = apply_event(&mut cache, event(EventType::Added, added.clone())).unwrap();
        assert_eq!(key, ResourceKey::new("prod", "db", "Cluster", "pg1"));
        assert_eq!(
            serde_json::to_value(cache.get(&key).unwrap()).unwrap(),
            serde_json::to_value(&added).unwrap()
        );

        let modified = cnpg_cluster("pg1", "db", Some(3), 3);
        apply_event(&mut cache, event(EventType::Modified, modified.clone())).unwrap();
        assert_eq!(
            serde_json::to_value(cache.get(&key).unwrap()).unwrap(),
            serde_json::to_value(&modified).unwrap()
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_deleted_removes_entry_whether_or_not_present() {
        let mut cache = ResourceCache::new();
        let resource = cnpg_cluster("pg1", "db", Some(3), 3);

        // Absent: still a valid event
        let key = apply_event(&mut cache, event(EventType::Deleted, resource.clone())).unwrap();
        assert!(cache.get(&key).is_none());

        apply_event(&mut cache, event(EventType::Added, resource.clone())).unwrap();
        apply_event(&mut cache, event(EventType::Deleted, resource)).unwrap();
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_namespace_defaults() {
        let mut cache = ResourceCache::new();
        let mut resource = cnpg_cluster("pg1", "db", Some(1), 1);
        resource.metadata.namespace = None;

        let key = apply_event(&mut cache, event(EventType::Added, resource)).unwrap();
        assert_eq!(key.namespace, "default");
    }

    #[test]
    fn test_missing_kind_or_name_is_rejected() {
        let mut cache = ResourceCache::new();

        let mut no_kind = cnpg_cluster("pg1", "db", Some(1), 1);
        no_kind.types = None;
        assert!(apply_event(&mut cache, event(EventType::Added, no_kind)).is_err());

        let mut empty_kind = object("postgresql.cnpg.io/v1", "", "pg1", "db", json!({}));
        empty_kind.metadata.name = Some("pg1".to_string());
        assert!(apply_event(&mut cache, event(EventType::Added, empty_kind)).is_err());

        let mut no_name = cnpg_cluster("pg1", "db", Some(1), 1);
        no_name.metadata.name = None;
        assert!(apply_event(&mut cache, event(EventType::Added, no_name)).is_err());

        let mut empty_name = cnpg_cluster("pg1", "db", Some(1), 1);
        empty_name.metadata.name = Some(String::new());
        assert!(apply_event(&mut cache, event(EventType::Modified, empty_name)).is_err());

        assert!(cache.is_empty());
    }

    #[test]
    fn test_rejected_delete_keeps_entry() {
        let mut cache = ResourceCache::new();
        let resource = cnpg_cluster("pg1", "db", Some(1), 1);
        apply_event(&mut cache, event(EventType::Added, resource.clone())).unwrap();

        let mut nameless = resource;
        nameless.metadata.name = None;
        assert!(apply_event(&mut cache, event(EventType::Deleted, nameless)).is_err());
        assert_eq!(cache.len(), 1);
    }
}
