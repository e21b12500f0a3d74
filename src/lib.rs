//! Unified Replication Operator
//!
//! A Kubernetes operator that lets a single `UnifiedVolumeReplication`
//! resource drive volume replication on Ceph, NetApp Trident or Dell
//! PowerStore, translating one backend-neutral vocabulary of states and modes
//! into each backend's native control objects.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │              UnifiedVolumeReplication Reconciler (kube-runtime)              │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                            Controller Engine                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  Discovery   │─▶│   Backend    │─▶│  Validation  │─▶│   Translation   │  │
//! │  │  (cached)    │  │  Selection   │  │              │  │     Engine      │  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └────────┬────────┘  │
//! │                                                                  │           │
//! │                          ┌───────────────────────────────────────┘           │
//! │                          ▼                                                   │
//! │                 ┌─────────────────┐                                          │
//! │                 │ Adapter Registry │                                         │
//! │                 └────────┬────────┘                                          │
//! ├──────────────────────────┼──────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌──┴──────────────┐  ┌─────────────────────────────┐  │
//! │  │      Ceph       │  │     Trident     │  │         PowerStore          │  │
//! │  │ VolumeReplication│ │ MirrorRelation. │  │  DellCSIReplicationGroup    │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`]: Backend adapters and their registry
//! - [`api`]: Introspection REST API
//! - [`config`]: Operator configuration
//! - [`controller`]: Controller engine, discovery cache, selection, reconciler
//! - [`crd`]: Custom Resource Definitions
//! - [`discovery`]: Backend discovery
//! - [`domain`]: Core domain types and ports
//! - [`error`]: Error types and handling
//! - [`translation`]: Unified <-> backend vocabulary translation

pub mod adapters;
pub mod api;
pub mod config;
pub mod controller;
pub mod crd;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod translation;

// Re-export commonly used types
pub use adapters::{AdapterConfig, AdapterRegistry, ObjectStore};

pub use api::{ApiServer, ApiServerConfig};

pub use config::OperatorConfig;

pub use controller::{
    BackendSelector, CacheStats, ControllerConfig, ControllerEngine, DetectionRule,
    ReplicationOutcome, SelectionError,
};

pub use crd::{
    ReplicationMode, ReplicationState, UnifiedVolumeReplication, UnifiedVolumeReplicationSpec,
    UnifiedVolumeReplicationStatus,
};

pub use discovery::{ApiGroupDiscoverer, StaticDiscoverer};

pub use domain::ports::{
    Backend, BackendDiscoverer, BackendStatus, Capability, DiscoveryResult, Operation,
    ReplicationAdapter, ReplicationStatus,
};

pub use error::{Error, ErrorAction, PipelineStage, Result};

pub use translation::{
    TranslationEngine, TranslationError, TranslationErrorKind, TranslationMap,
};

/// Operator version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Operator name
pub const NAME: &str = "unified-replication-operator";
