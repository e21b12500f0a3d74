//! PowerStore Replication Adapter
//!
//! Drives Dell CSM replication through `DellCSIReplicationGroup` objects.
//! Transitions are requested with the group's `action` field; the desired
//! state is kept alongside it so status can be reported before the driver
//! has acted.

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

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the PowerStore adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PowerStoreConfig {
    /// CSI driver owning the replication groups
    pub driver_name: String,
    /// RPO applied when neither the schedule nor the extension sets one
    pub default_rpo: String,
}

impl Default for PowerStoreConfig {
    fn default() -> Self {
        Self {
            driver_name: "csi-powerstore.dellemc.com".to_string(),
            default_rpo: "Five_Minutes".to_string(),
        }
    }
}

pub const POWERSTORE_KIND: NativeKind = NativeKind {
    group: "replication.storage.dell.com",
    version: "v1",
    kind: "DellCSIReplicationGroup",
    plural: "dellcsireplicationgroups",
};

/// Replication group action that moves the group toward a native state
fn action_for(native_state: &str) -> Option<&'static str> {
    match native_state {
        "failing_over" => Some("FAILOVER_REMOTE"),
        "reprotecting" => Some("REPROTECT_LOCAL"),
        "synchronizing" => Some("SYNC"),
        _ => None,
    }
}

// =============================================================================
// PowerStore Adapter
// =============================================================================

/// Adapter for Dell PowerStore replication groups
pub struct PowerStoreAdapter {
    config: PowerStoreConfig,
    translator: Arc<TranslationEngine>,
    store: Arc<ObjectStore>,
    initialized: AtomicBool,
}

impl PowerStoreAdapter {
    pub fn new(
        config: PowerStoreConfig,
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
            .translate_state_to_backend(Backend::PowerStore, spec.replication_state.as_str())?;
        let mode = self
            .translator
            .translate_mode_to_backend(Backend::PowerStore, spec.replication_mode.as_str())?;

        let powerstore = spec.extensions.as_ref().and_then(|e| e.powerstore.as_ref());
        let rpo = powerstore
            .and_then(|p| p.rpo_settings.clone())
            .or_else(|| spec.schedule.as_ref().and_then(|s| s.rpo.clone()))
            .unwrap_or_else(|| self.config.default_rpo.clone());
        let volume_groups = powerstore
            .map(|p| p.volume_groups.clone())
            .unwrap_or_default();

        Ok(json!({
            "apiVersion": POWERSTORE_KIND.api_version(),
            "kind": POWERSTORE_KIND.kind,
            "metadata": {
                "name": intent.name(),
                "namespace": intent.namespace_or_default(),
                "labels": intent.owner_labels(),
            },
            "spec": {
                "driverName": self.config.driver_name,
                "action": action_for(&state).unwrap_or(""),
                "replicationState": state,
                "remoteClusterId": spec.destination_endpoint.cluster,
                "protectionGroupAttributes": {
                    "mode": mode,
                    "rpo": rpo,
                },
                "volumeGroups": volume_groups,
                "sourcePVC": spec.volume_mapping.source.pvc_name,
            }
        }))
    }

    fn parse_status(object: &Value) -> ReplicationStatus {
        let state = string_at(object, "/status/state")
            .or_else(|| string_at(object, "/spec/replicationState"))
            .unwrap_or_default()
            .to_string();
        let mode = string_at(object, "/spec/protectionGroupAttributes/mode")
            .unwrap_or_default()
            .to_string();
        let message = string_at(object, "/status/lastAction/condition")
            .unwrap_or("replication group requested")
            .to_string();
        let last_sync_time = string_at(object, "/status/lastAction/time")
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
        if !self.initialized.load(Ordering::Acquire) {
            return Err(Error::AdapterOperation {
                backend: Backend::PowerStore,
                operation: operation.to_string(),
                reason: "adapter not initialized".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicationAdapter for PowerStoreAdapter {
    fn backend(&self) -> Backend {
        Backend::PowerStore
    }

    async fn initialize(&self, _cancel: &CancellationToken) -> Result<()> {
        self.translator.validate_translation(Backend::PowerStore)?;
        if !self.initialized.swap(true, Ordering::AcqRel) {
            debug!("PowerStore adapter initialized for driver {}", self.config.driver_name);
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
        info!("Creating DellCSIReplicationGroup {}", intent.name());
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
        info!("Updating DellCSIReplicationGroup {}", intent.name());
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
        info!("Deleting DellCSIReplicationGroup {}", intent.name());
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
        let object = self
            .store
            .get(cancel, intent.namespace_or_default(), intent.name())
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: POWERSTORE_KIND.kind.into(),
                name: intent.name().into(),
            })?;
        Ok(Self::parse_status(&object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        Extensions, PowerStoreExtensions, ReplicationMode, ReplicationState, Schedule,
        ScheduleMode, UnifiedVolumeReplicationSpec,
    };

    fn adapter() -> PowerStoreAdapter {
        PowerStoreAdapter::new(
            PowerStoreConfig::default(),
            Arc::new(TranslationEngine::new().unwrap()),
            Arc::new(ObjectStore::in_memory(POWERSTORE_KIND)),
        )
    }

    fn intent(state: ReplicationState) -> UnifiedVolumeReplication {
        let mut uvr = UnifiedVolumeReplication::new(
            "ledger",
            UnifiedVolumeReplicationSpec {
                replication_state: state,
                replication_mode: ReplicationMode::Eventual,
                schedule: Some(Schedule {
                    mode: ScheduleMode::Interval,
                    rpo: Some("Fifteen_Minutes".into()),
                    rto: None,
                }),
                ..Default::default()
            },
        );
        uvr.metadata.namespace = Some("finance".into());
        uvr.spec.destination_endpoint.cluster = "dr-east".into();
        uvr
    }

    #[test]
    fn test_promotion_requests_failover() {
        let object = adapter().build_object(&intent(ReplicationState::Promoting)).unwrap();

        assert_eq!(string_at(&object, "/spec/replicationState"), Some("failing_over"));
        assert_eq!(string_at(&object, "/spec/action"), Some("FAILOVER_REMOTE"));
        assert_eq!(
            string_at(&object, "/spec/protectionGroupAttributes/mode"),
            Some("METRO_ASYNC")
        );
        assert_eq!(string_at(&object, "/spec/remoteClusterId"), Some("dr-east"));
    }

    #[test]
    fn test_rpo_precedence() {
        let adapter = adapter();

        let object = adapter.build_object(&intent(ReplicationState::Source)).unwrap();
        assert_eq!(string_at(&object, "/spec/action"), Some(""));
        assert_eq!(
            string_at(&object, "/spec/protectionGroupAttributes/rpo"),
            Some("Fifteen_Minutes")
        );

        let mut pinned = intent(ReplicationState::Source);
        pinned.spec.extensions = Some(Extensions {
            powerstore: Some(PowerStoreExtensions {
                rpo_settings: Some("One_Minute".into()),
                volume_groups: vec!["vg-ledger".into()],
            }),
            ..Default::default()
        });
        let object = adapter.build_object(&pinned).unwrap();
        assert_eq!(
            string_at(&object, "/spec/protectionGroupAttributes/rpo"),
            Some("One_Minute")
        );
        assert_eq!(string_at(&object, "/spec/volumeGroups/0"), Some("vg-ledger"));
    }

    #[tokio::test]
    async fn test_update_replaces_object() {
        let adapter = adapter();
        let token = CancellationToken::new();
        adapter.initialize(&token).await.unwrap();

        adapter
            .create_replication(&token, &intent(ReplicationState::Replica))
            .await
            .unwrap();
        adapter
            .update_replication(&token, &intent(ReplicationState::Syncing))
            .await
            .unwrap();

        let status = adapter
            .get_replication_status(&token, &intent(ReplicationState::Syncing))
            .await
            .unwrap();
        assert_eq!(status.state, "synchronizing");
        assert_eq!(status.mode, "METRO_ASYNC");
    }
}
