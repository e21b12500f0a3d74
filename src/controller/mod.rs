//! Controller Module
//!
//! The replication pipeline and the Kubernetes loop that drives it:
//! - `engine`: discovery, selection, validation, translation, dispatch
//! - `cache`: time-bounded discovery cache
//! - `selector`: deterministic backend selection
//! - `reconciler`: kube-runtime controller over UnifiedVolumeReplication

pub mod cache;
pub mod engine;
pub mod reconciler;
pub mod selector;

pub use cache::{CacheStats, DiscoveryCache};
pub use engine::{
    required_capability, ControllerConfig, ControllerEngine, OperationCount, ReplicationOutcome,
};
pub use reconciler::Context;
pub use selector::{BackendSelector, DetectionRule, SelectionError};
