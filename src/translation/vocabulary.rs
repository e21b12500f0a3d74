//! Built-in backend vocabularies
//!
//! Forward tables only; reverse tables are derived when the maps are built.

use super::error::TranslationResult;
use super::map::{Axis, TranslationMap};
use crate::domain::ports::Backend;

// =============================================================================
// Ceph (csi-addons VolumeReplication)
// =============================================================================

const CEPH_STATES: &[(&str, &str)] = &[
    ("source", "primary"),
    ("replica", "secondary"),
    ("promoting", "promoting"),
    ("demoting", "demoting"),
    ("syncing", "resync"),
    ("failed", "error"),
];

const CEPH_MODES: &[(&str, &str)] = &[
    ("synchronous", "sync"),
    ("asynchronous", "async"),
    ("eventual", "snapshot"),
];

const CEPH_STATE_ALIASES: &[(&str, &str)] = &[("resyncing", "syncing")];

// =============================================================================
// Trident (TridentMirrorRelationship)
// =============================================================================

const TRIDENT_STATES: &[(&str, &str)] = &[
    ("source", "promoted"),
    ("replica", "established"),
    ("promoting", "promoting"),
    ("demoting", "demoting"),
    ("syncing", "reestablishing"),
    ("failed", "failed"),
];

const TRIDENT_MODES: &[(&str, &str)] = &[
    ("synchronous", "Sync"),
    ("asynchronous", "MirrorAllSnapshots"),
    ("eventual", "MirrorLatest"),
];

const TRIDENT_STATE_ALIASES: &[(&str, &str)] = &[("reestablished", "syncing")];

// =============================================================================
// PowerStore (DellCSIReplicationGroup)
// =============================================================================

const POWERSTORE_STATES: &[(&str, &str)] = &[
    ("source", "source"),
    ("replica", "destination"),
    ("promoting", "failing_over"),
    ("demoting", "reprotecting"),
    ("syncing", "synchronizing"),
    ("failed", "error"),
];

const POWERSTORE_MODES: &[(&str, &str)] = &[
    ("synchronous", "SYNC"),
    ("asynchronous", "ASYNC"),
    ("eventual", "METRO_ASYNC"),
];

const POWERSTORE_STATE_ALIASES: &[(&str, &str)] = &[("synchronized", "replica")];

/// State and mode maps for one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendVocabulary {
    pub state: TranslationMap,
    pub mode: TranslationMap,
}

impl BackendVocabulary {
    pub fn map(&self, axis: Axis) -> &TranslationMap {
        match axis {
            Axis::State => &self.state,
            Axis::Mode => &self.mode,
        }
    }
}

/// Build the built-in vocabulary for a backend
pub fn default_vocabulary(backend: Backend) -> TranslationResult<BackendVocabulary> {
    let (states, modes, aliases) = match backend {
        Backend::Ceph => (CEPH_STATES, CEPH_MODES, CEPH_STATE_ALIASES),
        Backend::Trident => (TRIDENT_STATES, TRIDENT_MODES, TRIDENT_STATE_ALIASES),
        Backend::PowerStore => (POWERSTORE_STATES, POWERSTORE_MODES, POWERSTORE_STATE_ALIASES),
    };

    let state = aliases.iter().fold(
        TranslationMap::from_forward(backend, Axis::State, states.iter().copied())?,
        |map, (native, unified)| map.with_alias(*native, *unified),
    );
    let mode = TranslationMap::from_forward(backend, Axis::Mode, modes.iter().copied())?;

    Ok(BackendVocabulary { state, mode })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ReplicationMode, ReplicationState};

    #[test]
    fn test_defaults_cover_unified_vocabulary() {
        for backend in Backend::all() {
            let vocab = default_vocabulary(*backend).unwrap();
            for state in ReplicationState::all() {
                assert!(
                    vocab.state.to_backend(state.as_str()).is_ok(),
                    "{} has no value for state {}",
                    backend,
                    state
                );
            }
            for mode in ReplicationMode::all() {
                assert!(vocab.mode.to_backend(mode.as_str()).is_ok());
            }
        }
    }

    #[test]
    fn test_defaults_validate() {
        for backend in Backend::all() {
            let vocab = default_vocabulary(*backend).unwrap();
            vocab.state.validate().unwrap();
            vocab.mode.validate().unwrap();
        }
    }
}
