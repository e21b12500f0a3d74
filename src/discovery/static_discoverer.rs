//! Static Discoverer
//!
//! Serves a fixed set of discovery results. Used in standalone mode, where no
//! cluster is reachable, and as an instrumented discoverer in tests.

use super::profile;
use crate::domain::ports::{
    cancellable, Backend, BackendDiscoverer, BackendStatus, DiscoveryResult,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// In-memory discoverer with call counters
#[derive(Default)]
pub struct StaticDiscoverer {
    results: RwLock<Vec<DiscoveryResult>>,
    failure: RwLock<Option<String>>,
    list_calls: AtomicU64,
    backend_calls: AtomicU64,
}

impl StaticDiscoverer {
    pub fn new(results: Vec<DiscoveryResult>) -> Self {
        Self {
            results: RwLock::new(results),
            ..Default::default()
        }
    }

    /// Report the given backends as ready, with their profile capabilities
    pub fn ready(backends: &[Backend]) -> Self {
        Self::new(backends.iter().map(|b| ready_result(*b)).collect())
    }

    /// Replace the reported status of a backend, adding it if absent
    pub fn set_status(&self, backend: Backend, status: BackendStatus) {
        let mut results = self.results.write();
        match results.iter_mut().find(|r| r.backend == backend) {
            Some(existing) => existing.status = status,
            None => {
                let mut result = ready_result(backend);
                result.status = status;
                results.push(result);
            }
        }
    }

    /// Remove a backend, as if it were uninstalled
    pub fn remove(&self, backend: Backend) {
        self.results.write().retain(|r| r.backend != backend);
    }

    /// Make subsequent calls fail with the given reason; `None` clears it
    pub fn set_failure(&self, reason: Option<String>) {
        *self.failure.write() = reason;
    }

    /// Number of `discover_backends` calls served
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `discover_backend` calls served
    pub fn backend_calls(&self) -> u64 {
        self.backend_calls.load(Ordering::Relaxed)
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.read().as_ref() {
            Some(reason) => Err(Error::Internal(reason.clone())),
            None => Ok(()),
        }
    }
}

fn ready_result(backend: Backend) -> DiscoveryResult {
    let profile = profile(backend);
    DiscoveryResult::new(backend, BackendStatus::Ready)
        .with_capabilities(profile.capabilities.iter().copied())
        .with_api_group(profile.api_group)
}

#[async_trait]
impl BackendDiscoverer for StaticDiscoverer {
    async fn discover_backends(&self, cancel: &CancellationToken) -> Result<Vec<DiscoveryResult>> {
        cancellable(cancel, async {
            self.list_calls.fetch_add(1, Ordering::Relaxed);
            self.check_failure()?;
            Ok::<_, Error>(self
                .results
                .read()
                .iter()
                .filter(|r| r.status.is_present())
                .cloned()
                .collect())
        })
        .await
    }

    async fn discover_backend(
        &self,
        cancel: &CancellationToken,
        backend: Backend,
    ) -> Result<DiscoveryResult> {
        cancellable(cancel, async {
            self.backend_calls.fetch_add(1, Ordering::Relaxed);
            self.check_failure()?;
            Ok::<_, Error>(self
                .results
                .read()
                .iter()
                .find(|r| r.backend == backend)
                .cloned()
                .unwrap_or_else(|| DiscoveryResult::new(backend, BackendStatus::NotFound)))
        })
        .await
    }
}
