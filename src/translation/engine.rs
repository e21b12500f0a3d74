//! Translation Engine
//!
//! Holds the verified vocabularies of every registered backend and converts
//! unified state/mode values to backend values and back. Vocabularies are
//! fixed once the engine is built; every map is validated at build time and a
//! broken map refuses the whole engine.

use super::error::{TranslationError, TranslationErrorKind, TranslationResult};
use super::map::{Axis, TranslationMap};
use super::vocabulary::{default_vocabulary, BackendVocabulary};
use crate::domain::ports::Backend;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Converts replication vocabulary between the unified and backend forms
#[derive(Debug, Clone)]
pub struct TranslationEngine {
    vocabularies: BTreeMap<Backend, BackendVocabulary>,
}

impl TranslationEngine {
    /// Engine with the built-in vocabulary of every known backend
    pub fn new() -> TranslationResult<Self> {
        Self::builder().with_defaults()?.build()
    }

    pub fn builder() -> TranslationEngineBuilder {
        TranslationEngineBuilder::default()
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    pub fn translate_state_to_backend(&self, backend: Backend, unified: &str) -> TranslationResult<String> {
        self.to_backend(backend, Axis::State, unified)
    }

    pub fn translate_state_from_backend(&self, backend: Backend, native: &str) -> TranslationResult<String> {
        self.from_backend(backend, Axis::State, native)
    }

    // -------------------------------------------------------------------------
    // Mode
    // -------------------------------------------------------------------------

    pub fn translate_mode_to_backend(&self, backend: Backend, unified: &str) -> TranslationResult<String> {
        self.to_backend(backend, Axis::Mode, unified)
    }

    pub fn translate_mode_from_backend(&self, backend: Backend, native: &str) -> TranslationResult<String> {
        self.from_backend(backend, Axis::Mode, native)
    }

    // -------------------------------------------------------------------------
    // Validation & Introspection
    // -------------------------------------------------------------------------

    /// Check that both maps of a backend are bidirectionally consistent
    pub fn validate_translation(&self, backend: Backend) -> TranslationResult<()> {
        let vocab = self.vocabulary_for(backend, Axis::State, backend.name())?;
        vocab.state.validate()?;
        vocab.mode.validate()?;
        debug!("Translation maps for {} are consistent", backend);
        Ok(())
    }

    /// Validate every registered backend
    pub fn validate_all(&self) -> TranslationResult<()> {
        for backend in self.vocabularies.keys() {
            self.validate_translation(*backend)?;
        }
        Ok(())
    }

    /// Unified states the backend can express
    pub fn supported_states(&self, backend: Backend) -> TranslationResult<Vec<String>> {
        Ok(self
            .vocabulary_for(backend, Axis::State, backend.name())?
            .state
            .unified_values())
    }

    /// Unified modes the backend can express
    pub fn supported_modes(&self, backend: Backend) -> TranslationResult<Vec<String>> {
        Ok(self
            .vocabulary_for(backend, Axis::Mode, backend.name())?
            .mode
            .unified_values())
    }

    /// Backends with a registered vocabulary
    pub fn backends(&self) -> Vec<Backend> {
        self.vocabularies.keys().copied().collect()
    }

    pub fn vocabulary(&self, backend: Backend) -> Option<&BackendVocabulary> {
        self.vocabularies.get(&backend)
    }

    fn to_backend(&self, backend: Backend, axis: Axis, unified: &str) -> TranslationResult<String> {
        let map = self.vocabulary_for(backend, axis, unified)?.map(axis);
        map.to_backend(unified).map(str::to_string)
    }

    fn from_backend(&self, backend: Backend, axis: Axis, native: &str) -> TranslationResult<String> {
        let map = self.vocabulary_for(backend, axis, native)?.map(axis);
        map.from_backend(native).map(str::to_string)
    }

    fn vocabulary_for(&self, backend: Backend, axis: Axis, value: &str) -> TranslationResult<&BackendVocabulary> {
        self.vocabularies.get(&backend).ok_or_else(|| {
            TranslationError::new(
                TranslationErrorKind::UnsupportedMapping,
                backend,
                axis.field(),
                value,
                "no vocabulary registered for backend",
            )
        })
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects maps before the engine is frozen
#[derive(Debug, Default)]
pub struct TranslationEngineBuilder {
    states: BTreeMap<Backend, TranslationMap>,
    modes: BTreeMap<Backend, TranslationMap>,
}

impl TranslationEngineBuilder {
    /// Register the built-in vocabulary of every known backend
    pub fn with_defaults(mut self) -> TranslationResult<Self> {
        for backend in Backend::all() {
            let vocab = default_vocabulary(*backend)?;
            self.states.insert(*backend, vocab.state);
            self.modes.insert(*backend, vocab.mode);
        }
        Ok(self)
    }

    /// Register (or replace) one map, keyed by its backend and axis
    pub fn with_map(mut self, map: TranslationMap) -> Self {
        match map.axis() {
            Axis::State => self.states.insert(map.backend(), map),
            Axis::Mode => self.modes.insert(map.backend(), map),
        };
        self
    }

    /// Freeze the maps into an engine, validating every backend
    pub fn build(mut self) -> TranslationResult<TranslationEngine> {
        let mut vocabularies = BTreeMap::new();

        for (backend, state) in std::mem::take(&mut self.states) {
            let mode = self.modes.remove(&backend).ok_or_else(|| {
                TranslationError::new(
                    TranslationErrorKind::MissingMapping,
                    backend,
                    Axis::Mode.field(),
                    backend.name(),
                    "state vocabulary registered without a mode vocabulary",
                )
            })?;
            vocabularies.insert(backend, BackendVocabulary { state, mode });
        }

        if let Some(backend) = self.modes.keys().next() {
            return Err(TranslationError::new(
                TranslationErrorKind::MissingMapping,
                *backend,
                Axis::State.field(),
                backend.name(),
                "mode vocabulary registered without a state vocabulary",
            ));
        }

        let engine = TranslationEngine { vocabularies };
        engine.validate_all()?;

        info!(
            "Translation engine ready for {} backend(s)",
            engine.vocabularies.len()
        );
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ReplicationMode, ReplicationState};
    use assert_matches::assert_matches;

    #[test]
    fn test_round_trip_every_backend() {
        let engine = TranslationEngine::new().unwrap();

        for backend in engine.backends() {
            for state in engine.supported_states(backend).unwrap() {
                let native = engine.translate_state_to_backend(backend, &state).unwrap();
                assert_eq!(
                    engine.translate_state_from_backend(backend, &native).unwrap(),
                    state
                );
            }
            for mode in engine.supported_modes(backend).unwrap() {
                let native = engine.translate_mode_to_backend(backend, &mode).unwrap();
                assert_eq!(
                    engine.translate_mode_from_backend(backend, &native).unwrap(),
                    mode
                );
            }
        }
    }

    #[test]
    fn test_supported_domain_matches_crd_vocabulary() {
        let engine = TranslationEngine::new().unwrap();
        let states = engine.supported_states(Backend::PowerStore).unwrap();
        let modes = engine.supported_modes(Backend::PowerStore).unwrap();

        assert_eq!(states.len(), ReplicationState::all().len());
        assert_eq!(modes.len(), ReplicationMode::all().len());
    }

    #[test]
    fn test_custom_trident_map() {
        let states = TranslationMap::from_forward(
            Backend::Trident,
            Axis::State,
            [("primary", "established"), ("secondary", "reestablishing")],
        )
        .unwrap();
        let engine = TranslationEngine::builder()
            .with_defaults()
            .unwrap()
            .with_map(states)
            .build()
            .unwrap();

        assert_eq!(
            engine
                .translate_state_to_backend(Backend::Trident, "primary")
                .unwrap(),
            "established"
        );
        assert_eq!(
            engine
                .translate_state_from_backend(Backend::Trident, "established")
                .unwrap(),
            "primary"
        );
    }

    #[test]
    fn test_unknown_value_is_missing_mapping() {
        let engine = TranslationEngine::new().unwrap();

        let err = engine
            .translate_state_to_backend(Backend::Trident, "archived")
            .unwrap_err();
        assert_matches!(err.kind, TranslationErrorKind::MissingMapping);
        assert_eq!(err.backend, Backend::Trident);

        let err = engine
            .translate_mode_from_backend(Backend::Ceph, "")
            .unwrap_err();
        assert_matches!(err.kind, TranslationErrorKind::InvalidValue);
    }

    #[test]
    fn test_unregistered_backend_is_unsupported() {
        let states =
            TranslationMap::from_forward(Backend::Ceph, Axis::State, [("source", "primary")]).unwrap();
        let modes =
            TranslationMap::from_forward(Backend::Ceph, Axis::Mode, [("asynchronous", "async")]).unwrap();
        let engine = TranslationEngine::builder()
            .with_map(states)
            .with_map(modes)
            .build()
            .unwrap();

        let err = engine
            .translate_state_to_backend(Backend::PowerStore, "source")
            .unwrap_err();
        assert_matches!(err.kind, TranslationErrorKind::UnsupportedMapping);
        assert_eq!(engine.backends(), vec![Backend::Ceph]);
    }

    #[test]
    fn test_build_refuses_inconsistent_map() {
        let forward = BTreeMap::from([("source".to_string(), "primary".to_string())]);
        let reverse = BTreeMap::from([("primary".to_string(), "replica".to_string())]);
        let broken = TranslationMap::from_parts(Backend::Ceph, Axis::State, forward, reverse);

        let err = TranslationEngine::builder()
            .with_defaults()
            .unwrap()
            .with_map(broken)
            .build()
            .unwrap_err();

        assert_matches!(err.kind, TranslationErrorKind::InconsistentMapping);
        assert_eq!(err.backend, Backend::Ceph);
    }

    #[test]
    fn test_build_requires_both_axes() {
        let states =
            TranslationMap::from_forward(Backend::Trident, Axis::State, [("source", "promoted")]).unwrap();

        let err = TranslationEngine::builder().with_map(states).build().unwrap_err();
        assert_matches!(err.kind, TranslationErrorKind::MissingMapping);
        assert_eq!(err.field, "mode");
    }
}
