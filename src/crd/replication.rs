//! UnifiedVolumeReplication CRD
//!
//! The declarative replication intent: endpoints, volume mapping, desired
//! unified state and mode, an optional schedule and optional backend-specific
//! extension blocks. The resource is persisted by the API server; the operator
//! only reads the spec and writes back status.

use crate::domain::ports::Backend;
use crate::error::Error;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// UnifiedVolumeReplication CRD
// =============================================================================

/// UnifiedVolumeReplication describes replication of one volume between two
/// clusters, independent of the storage backend that realizes it.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "replication.unified.io",
    version = "v1alpha1",
    kind = "UnifiedVolumeReplication",
    plural = "unifiedvolumereplications",
    shortname = "uvr",
    status = "UnifiedVolumeReplicationStatus",
    printcolumn = r#"{"name": "State", "type": "string", "jsonPath": ".spec.replicationState"}"#,
    printcolumn = r#"{"name": "Mode", "type": "string", "jsonPath": ".spec.replicationMode"}"#,
    printcolumn = r#"{"name": "Backend", "type": "string", "jsonPath": ".status.backend"}"#,
    printcolumn = r#"{"name": "Observed", "type": "string", "jsonPath": ".status.state"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedVolumeReplicationSpec {
    /// Where data is replicated from
    pub source_endpoint: Endpoint,

    /// Where data is replicated to
    pub destination_endpoint: Endpoint,

    /// Source and destination volume identities
    pub volume_mapping: VolumeMapping,

    /// Desired unified replication state
    pub replication_state: ReplicationState,

    /// Desired unified replication mode
    pub replication_mode: ReplicationMode,

    /// Replication schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,

    /// Backend-specific settings; a populated block pins the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

// =============================================================================
// Unified Vocabulary
// =============================================================================

/// Backend-neutral replication state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationState {
    Source,
    Replica,
    Promoting,
    Demoting,
    Syncing,
    Failed,
}

impl ReplicationState {
    pub fn all() -> &'static [ReplicationState] {
        &[
            ReplicationState::Source,
            ReplicationState::Replica,
            ReplicationState::Promoting,
            ReplicationState::Demoting,
            ReplicationState::Syncing,
            ReplicationState::Failed,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationState::Source => "source",
            ReplicationState::Replica => "replica",
            ReplicationState::Promoting => "promoting",
            ReplicationState::Demoting => "demoting",
            ReplicationState::Syncing => "syncing",
            ReplicationState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReplicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReplicationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReplicationState::all()
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| Error::Configuration(format!("unknown replication state: {}", s)))
    }
}

/// Backend-neutral consistency mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationMode {
    Synchronous,
    Asynchronous,
    Eventual,
}

impl ReplicationMode {
    pub fn all() -> &'static [ReplicationMode] {
        &[
            ReplicationMode::Synchronous,
            ReplicationMode::Asynchronous,
            ReplicationMode::Eventual,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationMode::Synchronous => "synchronous",
            ReplicationMode::Asynchronous => "asynchronous",
            ReplicationMode::Eventual => "eventual",
        }
    }
}

impl std::fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReplicationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReplicationMode::all()
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| Error::Configuration(format!("unknown replication mode: {}", s)))
    }
}

// =============================================================================
// Sub-Types
// =============================================================================

/// Replication endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Cluster identifier
    pub cluster: String,

    #[serde(default)]
    pub region: Option<String>,

    /// Storage class name (used for backend detection)
    pub storage_class: String,
}

/// Volume identity on both sides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMapping {
    pub source: VolumeSource,
    pub destination: VolumeDestination,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSource {
    pub pvc_name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDestination {
    /// Backend volume handle on the destination cluster
    pub volume_handle: String,
    pub namespace: String,
}

/// Replication schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub mode: ScheduleMode,

    /// Recovery point objective (e.g. "15m")
    #[serde(default)]
    pub rpo: Option<String>,

    /// Recovery time objective (e.g. "5m")
    #[serde(default)]
    pub rto: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    #[default]
    Continuous,
    Interval,
}

/// Backend-specific extension blocks. At most one is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Extensions {
    #[serde(default)]
    pub ceph: Option<CephExtensions>,

    #[serde(default)]
    pub trident: Option<TridentExtensions>,

    #[serde(default)]
    pub powerstore: Option<PowerStoreExtensions>,
}

/// Ceph RBD mirroring settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CephExtensions {
    /// "journal" or "snapshot"
    #[serde(default)]
    pub mirroring_mode: Option<String>,

    #[serde(default)]
    pub scheduling_start_time: Option<String>,
}

/// NetApp Trident mirror settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TridentExtensions {
    /// Replication schedule name on the ONTAP side
    #[serde(default)]
    pub replication_schedule: Option<String>,

    /// Extra actions passed through to the mirror relationship
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Dell PowerStore replication group settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PowerStoreExtensions {
    #[serde(default)]
    pub rpo_settings: Option<String>,

    #[serde(default)]
    pub volume_groups: Vec<String>,
}

// =============================================================================
// Status
// =============================================================================

/// Status of the UnifiedVolumeReplication
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedVolumeReplicationStatus {
    /// Observed state, in unified vocabulary when translatable
    #[serde(default)]
    pub state: Option<String>,

    /// Observed mode, in unified vocabulary when translatable
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    /// Backend that realizes this intent
    #[serde(default)]
    pub backend: Option<Backend>,

    #[serde(default)]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_sync_time: Option<DateTime<Utc>>,

    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_reconcile_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub conditions: Vec<ReplicationCondition>,
}

/// Condition for replication status
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationCondition {
    /// Type of condition
    pub r#type: String,
    /// Status: True, False, Unknown
    pub status: ConditionStatus,
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// Condition status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

// =============================================================================
// Implementations
// =============================================================================

impl Default for UnifiedVolumeReplicationSpec {
    fn default() -> Self {
        Self {
            source_endpoint: Endpoint::default(),
            destination_endpoint: Endpoint::default(),
            volume_mapping: VolumeMapping::default(),
            replication_state: ReplicationState::Replica,
            replication_mode: ReplicationMode::Asynchronous,
            schedule: None,
            extensions: None,
        }
    }
}

impl Extensions {
    /// Backends whose extension block is populated, in declaration order
    pub fn populated(&self) -> Vec<Backend> {
        let mut backends = Vec::new();
        if self.ceph.is_some() {
            backends.push(Backend::Ceph);
        }
        if self.trident.is_some() {
            backends.push(Backend::Trident);
        }
        if self.powerstore.is_some() {
            backends.push(Backend::PowerStore);
        }
        backends
    }
}

impl UnifiedVolumeReplication {
    /// Get the name of this replication
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    /// Namespace, falling back to the source volume's namespace
    pub fn namespace_or_default(&self) -> &str {
        self.metadata
            .namespace
            .as_deref()
            .unwrap_or(&self.spec.volume_mapping.source.namespace)
    }

    /// Backends pinned through extension blocks
    pub fn explicit_backends(&self) -> Vec<Backend> {
        self.spec
            .extensions
            .as_ref()
            .map(Extensions::populated)
            .unwrap_or_default()
    }

    /// Backend recorded in status by an earlier successful reconcile
    pub fn bound_backend(&self) -> Option<Backend> {
        self.status.as_ref().and_then(|s| s.backend)
    }

    /// Storage class identifier of the source endpoint
    pub fn source_storage_class(&self) -> &str {
        &self.spec.source_endpoint.storage_class
    }

    /// Whether the spec changed since status was last written
    pub fn generation_changed(&self) -> bool {
        let observed = self.status.as_ref().and_then(|s| s.observed_generation);
        self.metadata.generation != observed
    }

    /// Labels identifying control objects owned by this intent
    pub fn owner_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(
            "replication.unified.io/name".to_string(),
            self.name().to_string(),
        );
        labels.insert(
            "app.kubernetes.io/managed-by".to_string(),
            "unified-replication-operator".to_string(),
        );
        labels
    }
}

impl UnifiedVolumeReplicationStatus {
    /// Set a condition, replacing existing if same type
    pub fn set_condition(&mut self, condition: ReplicationCondition) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
    }

    /// Check if the Ready condition is true
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.r#type == "Ready" && c.status == ConditionStatus::True)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_and_display() {
        for state in ReplicationState::all() {
            assert_eq!(state.as_str().parse::<ReplicationState>().unwrap(), *state);
        }
        assert!("archived".parse::<ReplicationState>().is_err());
        assert_eq!(format!("{}", ReplicationMode::Eventual), "eventual");
    }

    #[test]
    fn test_explicit_backends() {
        let mut uvr = UnifiedVolumeReplication::new("db", UnifiedVolumeReplicationSpec::default());
        assert!(uvr.explicit_backends().is_empty());

        uvr.spec.extensions = Some(Extensions {
            powerstore: Some(PowerStoreExtensions::default()),
            ..Default::default()
        });
        assert_eq!(uvr.explicit_backends(), vec![Backend::PowerStore]);
    }

    #[test]
    fn test_spec_deserializes_camel_case() {
        let spec: UnifiedVolumeReplicationSpec = serde_json::from_value(serde_json::json!({
            "sourceEndpoint": {"cluster": "east", "storageClass": "ontap-san"},
            "destinationEndpoint": {"cluster": "west", "storageClass": "ontap-san"},
            "volumeMapping": {
                "source": {"pvcName": "data", "namespace": "apps"},
                "destination": {"volumeHandle": "vol-1", "namespace": "apps"}
            },
            "replicationState": "source",
            "replicationMode": "synchronous",
            "extensions": {"trident": {"actions": ["update"]}}
        }))
        .unwrap();

        assert_eq!(spec.replication_state, ReplicationState::Source);
        assert_eq!(spec.replication_mode, ReplicationMode::Synchronous);
        assert_eq!(
            spec.extensions.unwrap().populated(),
            vec![Backend::Trident]
        );
    }

    #[test]
    fn test_set_condition_replaces_same_type() {
        let mut status = UnifiedVolumeReplicationStatus::default();
        let condition = |status| ReplicationCondition {
            r#type: "Ready".into(),
            status,
            last_transition_time: None,
            reason: None,
            message: None,
        };

        status.set_condition(condition(ConditionStatus::False));
        status.set_condition(condition(ConditionStatus::True));

        assert_eq!(status.conditions.len(), 1);
        assert!(status.is_ready());
    }
}
