//! Domain Ports - Core trait definitions for the replication operator
//!
//! These traits define the boundaries between the orchestration core and the
//! external systems it drives: the discovery of installed replication backends
//! and the per-backend adapters that mutate native control objects.

use crate::crd::UnifiedVolumeReplication;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Backends
// =============================================================================

/// Storage replication systems supported by the unified control plane
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Ceph,
    Trident,
    PowerStore,
}

impl Backend {
    /// All known backends
    pub fn all() -> &'static [Backend] {
        &[Backend::Ceph, Backend::Trident, Backend::PowerStore]
    }

    /// Name used in configuration, logs and API paths
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Ceph => "ceph",
            Backend::Trident => "trident",
            Backend::PowerStore => "powerstore",
        }
    }

    /// Parse a backend from its name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ceph" => Some(Backend::Ceph),
            "trident" => Some(Backend::Trident),
            "powerstore" => Some(Backend::PowerStore),
            _ => None,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Backend::parse(s).ok_or_else(|| Error::Configuration(format!("unknown backend: {}", s)))
    }
}

// =============================================================================
// Discovery Types
// =============================================================================

/// Readiness of a backend as observed by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendStatus {
    /// Control-object API installed and serving
    Ready,
    /// Installed but not yet confirmed ready
    Available,
    /// Installed but not usable
    Unready,
    /// Not installed in the cluster
    NotFound,
}

impl BackendStatus {
    /// Whether the backend can be selected at all
    pub fn is_present(&self) -> bool {
        !matches!(self, BackendStatus::NotFound)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, BackendStatus::Ready)
    }
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendStatus::Ready => write!(f, "Ready"),
            BackendStatus::Available => write!(f, "Available"),
            BackendStatus::Unready => write!(f, "Unready"),
            BackendStatus::NotFound => write!(f, "NotFound"),
        }
    }
}

/// Replication capability flags reported per backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    SyncReplication,
    AsyncReplication,
    Promotion,
    Demotion,
    Resync,
    Failover,
    Failback,
    ConsistencyGroups,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::SyncReplication => "sync-replication",
            Capability::AsyncReplication => "async-replication",
            Capability::Promotion => "promotion",
            Capability::Demotion => "demotion",
            Capability::Resync => "resync",
            Capability::Failover => "failover",
            Capability::Failback => "failback",
            Capability::ConsistencyGroups => "consistency-groups",
        };
        write!(f, "{}", name)
    }
}

/// Result of discovering a single backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub backend: Backend,
    pub status: BackendStatus,
    pub capabilities: BTreeSet<Capability>,
    /// API group that was probed
    pub api_group: Option<String>,
    /// Free-text detail (e.g. why the backend is unready)
    pub message: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveryResult {
    /// Create a result stamped with the current time
    pub fn new(backend: Backend, status: BackendStatus) -> Self {
        Self {
            backend,
            status,
            capabilities: BTreeSet::new(),
            api_group: None,
            message: None,
            discovered_at: Utc::now(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    pub fn with_api_group(mut self, group: impl Into<String>) -> Self {
        self.api_group = Some(group.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

// =============================================================================
// Replication Operations
// =============================================================================

/// Operation requested against a replication intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    /// Status read without mutating the backend
    Sync,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Sync => "sync",
        }
    }

    /// Whether the operation mutates backend control objects
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::Sync)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Replication status as reported by a backend
///
/// Adapters fill `state` and `mode` with backend vocabulary; the controller
/// translates them to unified vocabulary before handing the status out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationStatus {
    pub state: String,
    pub mode: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,
}

// =============================================================================
// Backend Discoverer Port
// =============================================================================

/// Port for discovering installed replication backends
///
/// Implementations talk to the runtime environment's resource catalog and may
/// be slow or fail; callers cache their answers.
#[async_trait]
pub trait BackendDiscoverer: Send + Sync {
    /// Discover every present backend, in a stable order
    async fn discover_backends(&self, cancel: &CancellationToken) -> Result<Vec<DiscoveryResult>>;

    /// Discover a single backend
    async fn discover_backend(
        &self,
        cancel: &CancellationToken,
        backend: Backend,
    ) -> Result<DiscoveryResult>;
}

// =============================================================================
// Replication Adapter Port
// =============================================================================

/// Port for backend-specific replication control
#[async_trait]
pub trait ReplicationAdapter: Send + Sync {
    /// Backend this adapter drives
    fn backend(&self) -> Backend;

    /// Prepare connections or caches; must be idempotent
    async fn initialize(&self, cancel: &CancellationToken) -> Result<()>;

    async fn create_replication(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<()>;

    async fn update_replication(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<()>;

    async fn delete_replication(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<()>;

    /// Read the backend-native status; state and mode stay in backend vocabulary
    async fn get_replication_status(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<ReplicationStatus>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type BackendDiscovererRef = Arc<dyn BackendDiscoverer>;
pub type ReplicationAdapterRef = Arc<dyn ReplicationAdapter>;

/// Run a future unless the token fires first
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
