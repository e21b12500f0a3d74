//! Trident Replication Adapter
//!
//! Drives SnapMirror through `TridentMirrorRelationship` objects.

use super::store::{string_at, NativeKind, ObjectStore};
use crate::crd::UnifiedVolumeReplication;
use crate::domain::ports::{Backend, ReplicationAdapter, ReplicationStatus};
use crate::error::{Error, Result};
use crate::translation::TranslationEngine;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for the Trident adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TridentConfig {
    /// ONTAP schedule applied when the intent has none
    pub default_replication_schedule: Option<String>,
}

pub const TRIDENT_KIND: NativeKind = NativeKind {
    group: "trident.netapp.io",
    version: "v1",
    kind: "TridentMirrorRelationship",
    plural: "tridentmirrorrelationships",
};

/// Adapter for NetApp Trident mirror relationships
pub struct TridentAdapter {
    config: TridentConfig,
    translator: Arc<TranslationEngine>,
    store: Arc<ObjectStore>,
    initialized: AtomicBool,
}

impl TridentAdapter {
    pub fn new(
        config: TridentConfig,
        translator: Arc<TranslationEngine>,
        store: Arc<ObjectStore>,
    ) -> Self {
        Self {
            config,
            translator,
            store,
            initialized: AtomicBool::new(false),
        }
    }

    fn build_object(&self, intent: &UnifiedVolumeReplication) -> Result<Value> {
        let spec = &intent.spec;
        let state = self
            .translator
            .translate_state_to_backend(Backend::Trident, spec.replication_state.as_str())?;
        let policy = self
            .translator
            .translate_mode_to_backend(Backend::Trident, spec.replication_mode.as_str())?;

        let trident = spec.extensions.as_ref().and_then(|e| e.trident.as_ref());
        let schedule = trident
            .and_then(|t| t.replication_schedule.clone())
            .or_else(|| self.config.default_replication_schedule.clone());
        let actions = trident.map(|t| t.actions.clone()).unwrap_or_default();

        let mut object = json!({
            "apiVersion": TRIDENT_KIND.api_version(),
            "kind": TRIDENT_KIND.kind,
            "metadata": {
                "name": intent.name(),
                "namespace": intent.namespace_or_default(),
                "labels": intent.owner_labels(),
            },
            "spec": {
                "state": state,
                "replicationPolicy": policy,
                "volumeMappings": [{
                    "localPVCName": spec.volume_mapping.source.pvc_name,
                    "remoteVolumeHandle": spec.volume_mapping.destination.volume_handle,
                }],
            }
        });

        if let Some(spec_obj) = object.get_mut("spec").and_then(Value::as_object_mut) {
            if let Some(schedule) = schedule {
                spec_obj.insert("replicationSchedule".into(), json!(schedule));
            }
            if !actions.is_empty() {
                spec_obj.insert("actions".into(), json!(actions));
            }
        }

        Ok(object)
    }

    fn parse_status(object: &Value) -> ReplicationStatus {
        let state = string_at(object, "/status/conditions/0/state")
            .or_else(|| string_at(object, "/spec/state"))
            .unwrap_or_default()
            .to_string();
        let mode = string_at(object, "/spec/replicationPolicy")
            .unwrap_or_default()
            .to_string();
        let message = string_at(object, "/status/conditions/0/message")
            .unwrap_or("mirror relationship requested")
            .to_string();
        let last_sync_time = string_at(object, "/status/conditions/0/lastTransferTime")
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));

        ReplicationStatus {
            state,
            mode,
            message,
            last_sync_time,
        }
    }

    fn ensure_initialized(&self, operation: &str) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        Err(Error::AdapterOperation {
            backend: Backend::Trident,
            operation: operation.to_string(),
            reason: "adapter not initialized".into(),
        })
    }
}

#[async_trait]
impl ReplicationAdapter for TridentAdapter {
    fn backend(&self) -> Backend {
        Backend::Trident
    }

    async fn initialize(&self, _cancel: &CancellationToken) -> Result<()> {
        self.translator.validate_translation(Backend::Trident)?;
        if !self.initialized.swap(true, Ordering::AcqRel) {
            debug!("Trident adapter initialized");
        }
        Ok(())
    }

    async fn create_replication(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<()> {
        self.ensure_initialized("create")?;
        let object = self.build_object(intent)?;
        info!("Creating TridentMirrorRelationship {}", intent.name());
        self.store
            .apply(cancel, intent.namespace_or_default(), intent.name(), object)
            .await
    }

    async fn update_replication(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<()> {
        self.ensure_initialized("update")?;
        let object = self.build_object(intent)?;
        info!("Updating TridentMirrorRelationship {}", intent.name());
        self.store
            .apply(cancel, intent.namespace_or_default(), intent.name(), object)
            .await
    }

    async fn delete_replication(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<()> {
        self.ensure_initialized("delete")?;
        info!("Deleting TridentMirrorRelationship {}", intent.name());
        self.store
            .delete(cancel, intent.namespace_or_default(), intent.name())
            .await
    }

    async fn get_replication_status(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<ReplicationStatus> {
        self.ensure_initialized("status")?;
        match self
            .store
            .get(cancel, intent.namespace_or_default(), intent.name())
            .await?
        {
            Some(object) => Ok(Self::parse_status(&object)),
            None => Err(Error::ResourceNotFound {
                kind: TRIDENT_KIND.kind.into(),
                name: intent.name().into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        Extensions, ReplicationMode, ReplicationState, TridentExtensions,
        UnifiedVolumeReplicationSpec,
    };

    fn adapter(config: TridentConfig) -> TridentAdapter {
        TridentAdapter::new(
            config,
            Arc::new(TranslationEngine::new().unwrap()),
            Arc::new(ObjectStore::in_memory(TRIDENT_KIND)),
        )
    }

    fn intent(extensions: Option<Extensions>) -> UnifiedVolumeReplication {
        let mut uvr = UnifiedVolumeReplication::new(
            "orders",
            UnifiedVolumeReplicationSpec {
                replication_state: ReplicationState::Syncing,
                replication_mode: ReplicationMode::Synchronous,
                extensions,
                ..Default::default()
            },
        );
        uvr.metadata.namespace = Some("shop".into());
        uvr.spec.volume_mapping.source.pvc_name = "orders-pvc".into();
        uvr.spec.volume_mapping.destination.volume_handle = "svm1:orders_dr".into();
        uvr
    }

    #[test]
    fn test_build_object_uses_trident_vocabulary() {
        let object = adapter(TridentConfig::default()).build_object(&intent(None)).unwrap();

        assert_eq!(string_at(&object, "/spec/state"), Some("reestablishing"));
        assert_eq!(string_at(&object, "/spec/replicationPolicy"), Some("Sync"));
        assert_eq!(
            string_at(&object, "/spec/volumeMappings/0/remoteVolumeHandle"),
            Some("svm1:orders_dr")
        );
        assert!(object.pointer("/spec/replicationSchedule").is_none());
    }

    #[test]
    fn test_extension_schedule_overrides_default() {
        let adapter = adapter(TridentConfig {
            default_replication_schedule: Some("hourly".into()),
        });

        let object = adapter.build_object(&intent(None)).unwrap();
        assert_eq!(string_at(&object, "/spec/replicationSchedule"), Some("hourly"));

        let extensions = Extensions {
            trident: Some(TridentExtensions {
                replication_schedule: Some("5min".into()),
                actions: vec!["quiesce".into()],
            }),
            ..Default::default()
        };
        let object = adapter.build_object(&intent(Some(extensions))).unwrap();
        assert_eq!(string_at(&object, "/spec/replicationSchedule"), Some("5min"));
        assert_eq!(string_at(&object, "/spec/actions/0"), Some("quiesce"));
    }

    #[tokio::test]
    async fn test_status_reads_reported_condition() {
        let adapter = adapter(TridentConfig::default());
        let token = CancellationToken::new();
        adapter.initialize(&token).await.unwrap();
        adapter.initialize(&token).await.unwrap();

        let intent = intent(None);
        adapter.create_replication(&token, &intent).await.unwrap();
        let status = adapter.get_replication_status(&token, &intent).await.unwrap();
        assert_eq!(status.state, "reestablishing");

        let reported = json!({
            "spec": {"state": "established", "replicationPolicy": "MirrorAllSnapshots"},
            "status": {"conditions": [{"state": "reestablished", "message": "resync done"}]}
        });
        let status = TridentAdapter::parse_status(&reported);
        assert_eq!(status.state, "reestablished");
        assert_eq!(status.message, "resync done");
    }
}
