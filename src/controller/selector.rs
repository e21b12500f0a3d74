//! Backend Selection
//!
//! Picks the backend for an intent from the set discovery reports as
//! available. An intent whose status already records a backend stays on it,
//! so newly installed backends never move existing replications. Otherwise
//! the first match wins:
//! 1. explicit hint: a populated extension block
//! 2. naming heuristic: detection rules over the source storage class
//! 3. first available backend

use crate::crd::UnifiedVolumeReplication;
use crate::domain::ports::Backend;
use thiserror::Error;
use tracing::debug;

/// Selection failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no replication backends available in cluster")]
    NoBackendsAvailable,

    #[error("backend {backend} not available in cluster")]
    BackendNotAvailable { backend: Backend },

    #[error("extension blocks for more than one backend are set: {backends:?}")]
    AmbiguousExtensions { backends: Vec<Backend> },

    #[error("replication is bound to backend {bound}, extension block requests {requested}")]
    BoundBackendConflict { bound: Backend, requested: Backend },
}

/// Name fragments that identify a backend in a storage class identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRule {
    pub backend: Backend,
    pub fragments: Vec<String>,
}

impl DetectionRule {
    pub fn new<I, S>(backend: Backend, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backend,
            fragments: fragments
                .into_iter()
                .map(|f| f.into().to_lowercase())
                .collect(),
        }
    }

    /// Case-insensitive substring match
    pub fn matches(&self, identifier: &str) -> bool {
        let identifier = identifier.to_lowercase();
        self.fragments.iter().any(|f| identifier.contains(f.as_str()))
    }
}

/// Deterministic backend selector
#[derive(Debug, Clone)]
pub struct BackendSelector {
    rules: Vec<DetectionRule>,
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::new(vec![
            DetectionRule::new(Backend::Ceph, ["ceph", "rbd", "rook"]),
            DetectionRule::new(Backend::Trident, ["trident", "netapp", "ontap"]),
            DetectionRule::new(Backend::PowerStore, ["powerstore", "dell"]),
        ])
    }
}

impl BackendSelector {
    pub fn new(rules: Vec<DetectionRule>) -> Self {
        Self { rules }
    }

    /// Add a detection rule, consulted after the existing ones
    pub fn with_rule(mut self, rule: DetectionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[DetectionRule] {
        &self.rules
    }

    /// Select the backend for an intent
    pub fn select(
        &self,
        intent: &UnifiedVolumeReplication,
        available: &[Backend],
    ) -> Result<Backend, SelectionError> {
        let explicit = intent.explicit_backends();

        if let Some(bound) = intent.bound_backend() {
            if let Some(requested) = explicit.iter().copied().find(|b| *b != bound) {
                return Err(SelectionError::BoundBackendConflict { bound, requested });
            }
            return if available.contains(&bound) {
                debug!("Keeping {} on bound backend {}", intent.name(), bound);
                Ok(bound)
            } else {
                Err(SelectionError::BackendNotAvailable { backend: bound })
            };
        }

        match explicit.as_slice() {
            [] => {}
            [backend] => {
                return if available.contains(backend) {
                    debug!("Selected {} from extension block of {}", backend, intent.name());
                    Ok(*backend)
                } else {
                    Err(SelectionError::BackendNotAvailable { backend: *backend })
                };
            }
            _ => {
                return Err(SelectionError::AmbiguousExtensions { backends: explicit });
            }
        }

        if let Some(backend) = self.detect(intent.source_storage_class(), available) {
            debug!(
                "Selected {} for {} from storage class {}",
                backend,
                intent.name(),
                intent.source_storage_class()
            );
            return Ok(backend);
        }

        available
            .first()
            .copied()
            .ok_or(SelectionError::NoBackendsAvailable)
    }

    /// Apply the naming heuristic over the available backends, in order
    fn detect(&self, identifier: &str, available: &[Backend]) -> Option<Backend> {
        if identifier.is_empty() {
            return None;
        }
        available.iter().copied().find(|backend| {
            self.rules
                .iter()
                .any(|rule| rule.backend == *backend && rule.matches(identifier))
        })
    }
}
