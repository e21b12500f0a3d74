//! Backend Discovery Module
//!
//! Determines which replication backends are installed in the cluster and
//! what they can do:
//! - `api_group`: probes the Kubernetes API catalog
//! - `static_discoverer`: fixed answers for standalone mode and tests

pub mod api_group;
pub mod static_discoverer;

pub use api_group::*;
pub use static_discoverer::*;

use crate::domain::ports::{Backend, Capability};

/// What discovery knows about a backend before probing it
#[derive(Debug, Clone, Copy)]
pub struct BackendProfile {
    pub backend: Backend,
    /// API group serving the backend's replication control object
    pub api_group: &'static str,
    /// Kind of the replication control object
    pub kind: &'static str,
    pub capabilities: &'static [Capability],
}

const PROFILES: &[BackendProfile] = &[
    BackendProfile {
        backend: Backend::Ceph,
        api_group: "replication.storage.openshift.io",
        kind: "VolumeReplication",
        capabilities: &[
            Capability::AsyncReplication,
            Capability::Promotion,
            Capability::Demotion,
            Capability::Resync,
        ],
    },
    BackendProfile {
        backend: Backend::Trident,
        api_group: "trident.netapp.io",
        kind: "TridentMirrorRelationship",
        capabilities: &[
            Capability::SyncReplication,
            Capability::AsyncReplication,
            Capability::Promotion,
            Capability::Demotion,
            Capability::Resync,
        ],
    },
    BackendProfile {
        backend: Backend::PowerStore,
        api_group: "replication.storage.dell.com",
        kind: "DellCSIReplicationGroup",
        capabilities: &[
            Capability::SyncReplication,
            Capability::AsyncReplication,
            Capability::Promotion,
            Capability::Demotion,
            Capability::Failover,
            Capability::Failback,
            Capability::ConsistencyGroups,
        ],
    },
];

/// Static profile of a backend
pub fn profile(backend: Backend) -> &'static BackendProfile {
    // PROFILES lists every Backend variant
    PROFILES
        .iter()
        .find(|p| p.backend == backend)
        .unwrap_or(&PROFILES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_backend_has_a_profile() {
        for backend in Backend::all() {
            assert_eq!(profile(*backend).backend, *backend);
        }
    }

    #[test]
    fn test_ceph_has_no_sync_replication() {
        assert!(!profile(Backend::Ceph)
            .capabilities
            .contains(&Capability::SyncReplication));
    }
}
