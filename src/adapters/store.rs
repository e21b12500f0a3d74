//! Native Object Store
//!
//! Where adapters put the backend-native control objects they build. With a
//! Kubernetes client the objects are server-side applied as dynamic objects;
//! without one (standalone mode, tests) they live in an in-memory map.

use crate::domain::ports::cancellable;
use crate::error::{Error, Result};
use dashmap::DashMap;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Type of a native control object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
}

impl NativeKind {
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(self.group, self.version, self.kind);
        ApiResource::from_gvk_with_plural(&gvk, self.plural)
    }
}

enum Backing {
    Memory(DashMap<String, Value>),
    Cluster { client: Client, field_manager: String },
}

/// Stores native control objects for one adapter
pub struct ObjectStore {
    kind: NativeKind,
    backing: Backing,
}

impl ObjectStore {
    /// In-memory store
    pub fn in_memory(kind: NativeKind) -> Self {
        Self {
            kind,
            backing: Backing::Memory(DashMap::new()),
        }
    }

    /// Store that applies objects to the cluster
    pub fn cluster(kind: NativeKind, client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            kind,
            backing: Backing::Cluster {
                client,
                field_manager: field_manager.into(),
            },
        }
    }

    pub fn kind(&self) -> &NativeKind {
        &self.kind
    }

    /// Create or replace an object
    pub async fn apply(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
        object: Value,
    ) -> Result<()> {
        debug!("Applying {} {}/{}", self.kind.kind, namespace, name);
        match &self.backing {
            Backing::Memory(objects) => {
                objects.insert(key(namespace, name), object);
                Ok(())
            }
            Backing::Cluster {
                client,
                field_manager,
            } => {
                let api = self.api(client, namespace);
                let params = PatchParams::apply(field_manager).force();
                cancellable(cancel, async {
                    api.patch(name, &params, &Patch::Apply(&object)).await?;
                    Ok::<_, Error>(())
                })
                .await
            }
        }
    }

    /// Fetch an object, `None` when it does not exist
    pub async fn get(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>> {
        match &self.backing {
            Backing::Memory(objects) => Ok(objects.get(&key(namespace, name)).map(|o| o.clone())),
            Backing::Cluster { client, .. } => {
                let api = self.api(client, namespace);
                cancellable(cancel, async {
                    let object = api.get_opt(name).await?;
                    let value = object.map(serde_json::to_value).transpose()?;
                    Ok::<_, Error>(value)
                })
                .await
            }
        }
    }

    /// Delete an object; deleting a missing object is not an error
    pub async fn delete(&self, cancel: &CancellationToken, namespace: &str, name: &str) -> Result<()> {
        debug!("Deleting {} {}/{}", self.kind.kind, namespace, name);
        match &self.backing {
            Backing::Memory(objects) => {
                objects.remove(&key(namespace, name));
                Ok(())
            }
            Backing::Cluster { client, .. } => {
                let api = self.api(client, namespace);
                cancellable(cancel, async {
                    match api.delete(name, &DeleteParams::default()).await {
                        Ok(_) => Ok(()),
                        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
                        Err(e) => Err(Error::Kube(e)),
                    }
                })
                .await
            }
        }
    }

    /// Number of objects held in memory (always 0 for cluster-backed stores)
    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Memory(objects) => objects.len(),
            Backing::Cluster { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether objects go to a live cluster
    pub fn is_cluster_backed(&self) -> bool {
        matches!(self.backing, Backing::Cluster { .. })
    }

    fn api(&self, client: &Client, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(client.clone(), namespace, &self.kind.api_resource())
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Read a string at a JSON pointer
pub fn string_at<'a>(object: &'a Value, pointer: &str) -> Option<&'a str> {
    object.pointer(pointer).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind() -> NativeKind {
        NativeKind {
            group: "replication.storage.openshift.io",
            version: "v1alpha1",
            kind: "VolumeReplication",
            plural: "volumereplications",
        }
    }

    #[tokio::test]
    async fn test_memory_apply_get_delete() {
        let store = ObjectStore::in_memory(kind());
        let token = CancellationToken::new();

        store
            .apply(&token, "apps", "db", json!({"spec": {"replicationState": "primary"}}))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        let object = store.get(&token, "apps", "db").await.unwrap().unwrap();
        assert_eq!(string_at(&object, "/spec/replicationState"), Some("primary"));

        store.delete(&token, "apps", "db").await.unwrap();
        store.delete(&token, "apps", "db").await.unwrap();
        assert!(store.get(&token, "apps", "db").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_api_version() {
        assert_eq!(kind().api_version(), "replication.storage.openshift.io/v1alpha1");
    }
}
