//! Resource builders for unit tests.

use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::{json, Value};

pub fn object(api_version: &str, kind: &str, name: &str, namespace: &str, data: Value) -> DynamicObject {
    let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
    let ar = ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, kind));
    DynamicObject::new(name, &ar).within(namespace).data(data)
}

pub fn cnpg_cluster(name: &str, namespace: &str, ready: Option<i64>, total: i64) -> DynamicObject {
    let mut status = json!({ "instances": total });
    if let Some(ready) = ready {
        status["readyInstances"] = json!(ready);
    }
    object(
        "postgresql.cnpg.io/v1",
        "Cluster",
        name,
        namespace,
        json!({ "spec": { "instances": total }, "status": status }),
    )
}
