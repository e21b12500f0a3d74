//! Replication Backend Adapters
//!
//! Provides adapters for the supported replication backends:
//! - Ceph: csi-addons VolumeReplication
//! - Trident: TridentMirrorRelationship
//! - PowerStore: DellCSIReplicationGroup

pub mod ceph;
pub mod powerstore;
pub mod registry;
pub mod store;
pub mod trident;

pub use ceph::*;
pub use powerstore::*;
pub use registry::*;
pub use store::*;
pub use trident::*;

use serde::{Deserialize, Serialize};

/// Combined adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Field manager used for server-side apply
    pub field_manager: String,
    pub ceph: CephConfig,
    pub trident: TridentConfig,
    pub powerstore: PowerStoreConfig,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            field_manager: "unified-replication-operator".to_string(),
            ceph: CephConfig::default(),
            trident: TridentConfig::default(),
            powerstore: PowerStoreConfig::default(),
        }
    }
}
