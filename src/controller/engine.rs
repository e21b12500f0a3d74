//! Controller Engine
//!
//! Drives one intent and operation through the replication pipeline:
//! discovery, selection, validation, translation, adapter dispatch. Every
//! failure comes back wrapped with the stage it happened in.

use super::cache::{CacheStats, DiscoveryCache};
use super::selector::BackendSelector;
use crate::adapters::AdapterRegistry;
use crate::crd::{ReplicationMode, UnifiedVolumeReplication};
use crate::domain::ports::{
    cancellable, Backend, BackendDiscovererRef, Capability, DiscoveryResult, Operation,
    ReplicationAdapterRef, ReplicationStatus,
};
use crate::error::{Error, Result};
use crate::translation::TranslationEngine;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// =============================================================================
// Controller Configuration
// =============================================================================

/// Configuration for the controller engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Reuse discovery answers within the expiry window
    pub enable_caching: bool,
    /// Discovery cache expiry in seconds
    pub cache_expiry_secs: u64,
    /// Fail validation when the selected backend is not ready
    pub fail_on_unready_backend: bool,
    /// Fail validation when the backend lacks the capability the mode needs
    pub enforce_capabilities: bool,
    /// Reconciliations allowed to run at once
    pub max_concurrent_reconciles: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            enable_caching: true,
            cache_expiry_secs: 300,
            fail_on_unready_backend: false,
            enforce_capabilities: false,
            max_concurrent_reconciles: 2,
        }
    }
}

impl ControllerConfig {
    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }

    /// Reconcile concurrency as the controller runtime takes it; 0 would mean unbounded
    pub fn concurrency_limit(&self) -> Result<u16> {
        match u16::try_from(self.max_concurrent_reconciles) {
            Ok(0) => Err(Error::Configuration(
                "maxConcurrentReconciles must be at least 1".into(),
            )),
            Ok(limit) => Ok(limit),
            Err(_) => Err(Error::Configuration(format!(
                "maxConcurrentReconciles must be at most {}, got {}",
                u16::MAX,
                self.max_concurrent_reconciles
            ))),
        }
    }
}

// =============================================================================
// Results and Statistics
// =============================================================================

/// Result of a processed operation
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationOutcome {
    pub backend: Backend,
    /// Unified status; only set by `Operation::Sync`
    pub status: Option<ReplicationStatus>,
}

/// Processed and failed counts for one operation kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCount {
    pub succeeded: u64,
    pub failed: u64,
}

/// Capability a replication mode depends on
pub fn required_capability(mode: ReplicationMode) -> Capability {
    match mode {
        ReplicationMode::Synchronous => Capability::SyncReplication,
        ReplicationMode::Asynchronous | ReplicationMode::Eventual => Capability::AsyncReplication,
    }
}

// =============================================================================
// Controller Engine
// =============================================================================

/// Orchestrates discovery, selection, translation and adapter dispatch
pub struct ControllerEngine {
    config: ControllerConfig,
    discoverer: BackendDiscovererRef,
    translator: Arc<TranslationEngine>,
    registry: Arc<AdapterRegistry>,
    selector: BackendSelector,
    cache: DiscoveryCache,
    operations: DashMap<Operation, OperationCount>,
}

impl ControllerEngine {
    /// Create the engine. Fails when a registered backend has no consistent
    /// vocabulary; such a backend must not be served.
    pub fn new(
        config: ControllerConfig,
        discoverer: BackendDiscovererRef,
        translator: Arc<TranslationEngine>,
        registry: Arc<AdapterRegistry>,
    ) -> Result<Self> {
        for backend in registry.backends() {
            translator.validate_translation(backend)?;
        }

        let cache = DiscoveryCache::new(config.enable_caching, config.cache_expiry());
        info!(
            "Controller engine ready for backends {:?} (cache: {}, expiry: {}s)",
            registry.backends(),
            config.enable_caching,
            config.cache_expiry_secs
        );

        Ok(Self {
            config,
            discoverer,
            translator,
            registry,
            selector: BackendSelector::default(),
            cache,
            operations: DashMap::new(),
        })
    }

    /// Replace the backend selector
    pub fn with_selector(mut self, selector: BackendSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn translator(&self) -> &Arc<TranslationEngine> {
        &self.translator
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    /// Run an operation for an intent through the full pipeline
    pub async fn process_replication(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
        operation: Operation,
    ) -> Result<ReplicationOutcome> {
        let started = Instant::now();
        let result = self.run_pipeline(cancel, intent, operation).await;
        self.record(operation, result.is_ok());

        match &result {
            Ok(outcome) => info!(
                "Processed {} of {} on {} in {:?}",
                operation,
                intent.name(),
                outcome.backend,
                started.elapsed()
            ),
            Err(e) => warn!(
                stage = ?e.stage(),
                retryable = e.is_retryable(),
                "Failed {} of {}: {}",
                operation,
                intent.name(),
                e
            ),
        }
        result
    }

    async fn run_pipeline(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
        operation: Operation,
    ) -> Result<ReplicationOutcome> {
        let backend = self.select_backend(cancel, intent).await?;

        self.validate_backend(cancel, backend, intent)
            .await
            .map_err(|e| Error::Validation {
                backend,
                source: Box::new(e),
            })?;

        let (state, mode) = self.translate_intent(backend, intent)?;
        debug!(
            "Translated {} to {} vocabulary: state={}, mode={}",
            intent.name(),
            backend,
            state,
            mode
        );

        let adapter = self.prepare_adapter(cancel, backend).await?;

        let execution = |e: Error| Error::Execution {
            operation: operation.name().to_string(),
            source: Box::new(e),
        };
        let status = match operation {
            Operation::Create => {
                cancellable(cancel, adapter.create_replication(cancel, intent))
                    .await
                    .map_err(execution)?;
                None
            }
            Operation::Update => {
                cancellable(cancel, adapter.update_replication(cancel, intent))
                    .await
                    .map_err(execution)?;
                None
            }
            Operation::Delete => {
                cancellable(cancel, adapter.delete_replication(cancel, intent))
                    .await
                    .map_err(execution)?;
                None
            }
            Operation::Sync => {
                let native = cancellable(cancel, adapter.get_replication_status(cancel, intent))
                    .await
                    .map_err(execution)?;
                Some(self.to_unified(backend, native))
            }
        };

        Ok(ReplicationOutcome { backend, status })
    }

    /// Read the backend status of an intent in unified vocabulary
    ///
    /// Values that cannot be translated back are reported raw.
    pub async fn get_replication_status(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<ReplicationStatus> {
        let backend = self.select_backend(cancel, intent).await?;
        let adapter = self.prepare_adapter(cancel, backend).await?;

        let native = cancellable(cancel, adapter.get_replication_status(cancel, intent))
            .await
            .map_err(|e| Error::Execution {
                operation: "status".to_string(),
                source: Box::new(e),
            })?;
        Ok(self.to_unified(backend, native))
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Discovered backends, from cache when it is still valid
    pub async fn discover_backends(&self, cancel: &CancellationToken) -> Result<Vec<DiscoveryResult>> {
        if let Some(cached) = self.cache.fresh() {
            debug!("Discovery cache hit ({} backends)", cached.len());
            return Ok(cached);
        }

        let results = self
            .discoverer
            .discover_backends(cancel)
            .await
            .map_err(|e| Error::Discovery(Box::new(e)))?;
        self.cache.replace(&results);
        Ok(results)
    }

    /// Discover and pick the backend for an intent
    pub async fn select_backend(
        &self,
        cancel: &CancellationToken,
        intent: &UnifiedVolumeReplication,
    ) -> Result<Backend> {
        let discovered = self.discover_backends(cancel).await?;
        let available: Vec<Backend> = discovered.iter().map(|r| r.backend).collect();
        let backend = self.selector.select(intent, &available)?;
        debug!("Selected backend {} for {}", backend, intent.name());
        Ok(backend)
    }

    async fn validate_backend(
        &self,
        cancel: &CancellationToken,
        backend: Backend,
        intent: &UnifiedVolumeReplication,
    ) -> Result<()> {
        let result = match self.cache.lookup(backend) {
            Some(result) => result,
            None => self.discoverer.discover_backend(cancel, backend).await?,
        };

        if !result.status.is_ready() {
            if self.config.fail_on_unready_backend {
                return Err(Error::BackendNotReady {
                    backend,
                    status: result.status.to_string(),
                });
            }
            debug!(
                "Backend {} is {} but continuing with {}",
                backend,
                result.status,
                intent.name()
            );
        }

        if self.config.enforce_capabilities {
            let mode = intent.spec.replication_mode;
            let capability = required_capability(mode);
            if !result.supports(capability) {
                return Err(Error::MissingCapability {
                    backend,
                    capability: capability.to_string(),
                    mode: mode.to_string(),
                });
            }
        }

        Ok(())
    }

    fn translate_intent(
        &self,
        backend: Backend,
        intent: &UnifiedVolumeReplication,
    ) -> Result<(String, String)> {
        let state = self
            .translator
            .translate_state_to_backend(backend, intent.spec.replication_state.as_str())?;
        let mode = self
            .translator
            .translate_mode_to_backend(backend, intent.spec.replication_mode.as_str())?;
        Ok((state, mode))
    }

    async fn prepare_adapter(
        &self,
        cancel: &CancellationToken,
        backend: Backend,
    ) -> Result<ReplicationAdapterRef> {
        let adapter = self
            .registry
            .create(backend)
            .map_err(|e| Error::AdapterCreation {
                backend,
                source: Box::new(e),
            })?;

        cancellable(cancel, adapter.initialize(cancel))
            .await
            .map_err(|e| Error::AdapterInit {
                backend,
                source: Box::new(e),
            })?;

        Ok(adapter)
    }

    fn to_unified(&self, backend: Backend, mut status: ReplicationStatus) -> ReplicationStatus {
        match self.translator.translate_state_from_backend(backend, &status.state) {
            Ok(state) => status.state = state,
            Err(e) => warn!("Reporting raw {} state '{}': {}", backend, status.state, e),
        }
        match self.translator.translate_mode_from_backend(backend, &status.mode) {
            Ok(mode) => status.mode = mode,
            Err(e) => warn!("Reporting raw {} mode '{}': {}", backend, status.mode, e),
        }
        status
    }

    // =========================================================================
    // Cache and Statistics
    // =========================================================================

    /// Forget cached discovery; the next call goes to the discoverer
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Per-operation counts, in operation order
    pub fn operation_stats(&self) -> Vec<(Operation, OperationCount)> {
        [
            Operation::Create,
            Operation::Update,
            Operation::Delete,
            Operation::Sync,
        ]
        .into_iter()
        .map(|op| {
            let count = self.operations.get(&op).map(|c| *c).unwrap_or_default();
            (op, count)
        })
        .collect()
    }

    fn record(&self, operation: Operation, succeeded: bool) {
        let mut count = self.operations.entry(operation).or_default();
        if succeeded {
            count.succeeded += 1;
        } else {
            count.failed += 1;
        }
    }
}
