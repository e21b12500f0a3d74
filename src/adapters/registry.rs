//! Adapter Registry
//!
//! Maps each backend to a factory producing a fresh adapter instance.

use super::{
    AdapterConfig, CephAdapter, NativeKind, ObjectStore, PowerStoreAdapter, TridentAdapter,
    CEPH_KIND, POWERSTORE_KIND, TRIDENT_KIND,
};
use crate::domain::ports::{Backend, ReplicationAdapterRef};
use crate::error::{Error, Result};
use crate::translation::TranslationEngine;
use kube::Client;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds an adapter on demand
pub type AdapterFactory = Arc<dyn Fn() -> Result<ReplicationAdapterRef> + Send + Sync>;

/// Factory lookup by backend
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    factories: BTreeMap<Backend, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in adapters. Objects go to the cluster when a
    /// client is given and to memory otherwise; each backend gets one store
    /// shared by every adapter it produces.
    pub fn with_defaults(
        translator: Arc<TranslationEngine>,
        config: &AdapterConfig,
        client: Option<Client>,
    ) -> Self {
        let store = |kind: NativeKind| -> Arc<ObjectStore> {
            Arc::new(match &client {
                Some(client) => ObjectStore::cluster(kind, client.clone(), &config.field_manager),
                None => ObjectStore::in_memory(kind),
            })
        };

        let mut registry = Self::new();

        let (ceph_store, ceph_config, ceph_tx) =
            (store(CEPH_KIND), config.ceph.clone(), translator.clone());
        registry.register(Backend::Ceph, move || {
            Ok(Arc::new(CephAdapter::new(
                ceph_config.clone(),
                ceph_tx.clone(),
                ceph_store.clone(),
            )) as ReplicationAdapterRef)
        });

        let (trident_store, trident_config, trident_tx) =
            (store(TRIDENT_KIND), config.trident.clone(), translator.clone());
        registry.register(Backend::Trident, move || {
            Ok(Arc::new(TridentAdapter::new(
                trident_config.clone(),
                trident_tx.clone(),
                trident_store.clone(),
            )) as ReplicationAdapterRef)
        });

        let (ps_store, ps_config, ps_tx) =
            (store(POWERSTORE_KIND), config.powerstore.clone(), translator);
        registry.register(Backend::PowerStore, move || {
            Ok(Arc::new(PowerStoreAdapter::new(
                ps_config.clone(),
                ps_tx.clone(),
                ps_store.clone(),
            )) as ReplicationAdapterRef)
        });

        registry
    }

    /// Register or replace the factory for a backend
    pub fn register<F>(&mut self, backend: Backend, factory: F)
    where
        F: Fn() -> Result<ReplicationAdapterRef> + Send + Sync + 'static,
    {
        self.factories.insert(backend, Arc::new(factory));
    }

    /// Create an adapter for a backend
    pub fn create(&self, backend: Backend) -> Result<ReplicationAdapterRef> {
        let factory = self
            .factories
            .get(&backend)
            .ok_or(Error::AdapterNotRegistered { backend })?;
        factory()
    }

    pub fn is_registered(&self, backend: Backend) -> bool {
        self.factories.contains_key(&backend)
    }

    /// Registered backends in order
    pub fn backends(&self) -> Vec<Backend> {
        self.factories.keys().copied().collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}
