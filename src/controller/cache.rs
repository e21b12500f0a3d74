//! Discovery Cache
//!
//! Holds the last successful discovery answer. The entry map and the refresh
//! timestamp sit behind one lock so readers never see a half-replaced cache.
//! Concurrent misses are not deduplicated; each may refresh.

use crate::domain::ports::{Backend, DiscoveryResult};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

// =============================================================================
// Metrics
// =============================================================================

/// Cache counters, aligned to keep them off shared cache lines
#[repr(C, align(64))]
#[derive(Debug, Default)]
struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    invalidations: AtomicU64,
}

/// Point-in-time view of the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub enabled: bool,
    pub expiry_secs: u64,
    pub entries: usize,
    pub backends: Vec<Backend>,
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub invalidations: u64,
    pub hit_ratio: f64,
    pub last_discovery: Option<DateTime<Utc>>,
}

// =============================================================================
// Discovery Cache
// =============================================================================

#[derive(Default)]
struct CacheState {
    /// Kept in discovery order; "first available" depends on it
    entries: IndexMap<Backend, DiscoveryResult>,
    refreshed_at: Option<Instant>,
    refreshed_wall: Option<DateTime<Utc>>,
}

/// Time-bounded cache of discovery results
pub struct DiscoveryCache {
    enabled: bool,
    expiry: Duration,
    state: RwLock<CacheState>,
    metrics: CacheMetrics,
}

impl DiscoveryCache {
    pub fn new(enabled: bool, expiry: Duration) -> Self {
        Self {
            enabled,
            expiry,
            state: RwLock::new(CacheState::default()),
            metrics: CacheMetrics::default(),
        }
    }

    /// Cached results when still valid. Counts a hit or a miss.
    pub fn fresh(&self) -> Option<Vec<DiscoveryResult>> {
        if self.enabled {
            let state = self.state.read();
            if Self::is_valid(&state, self.expiry) {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                return Some(state.entries.values().cloned().collect());
            }
        }
        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Cached result for one backend when still valid; does not touch counters
    pub fn lookup(&self, backend: Backend) -> Option<DiscoveryResult> {
        if !self.enabled {
            return None;
        }
        let state = self.state.read();
        if Self::is_valid(&state, self.expiry) {
            state.entries.get(&backend).cloned()
        } else {
            None
        }
    }

    /// Replace the cache with a fresh discovery answer
    pub fn replace(&self, results: &[DiscoveryResult]) {
        let entries: IndexMap<Backend, DiscoveryResult> =
            results.iter().map(|r| (r.backend, r.clone())).collect();

        let mut state = self.state.write();
        state.entries = entries;
        state.refreshed_at = Some(Instant::now());
        state.refreshed_wall = Some(Utc::now());
        drop(state);

        self.metrics.refreshes.fetch_add(1, Ordering::Relaxed);
        debug!("Discovery cache refreshed with {} backend(s)", results.len());
    }

    /// Drop everything; the next lookup is a miss
    pub fn invalidate(&self) {
        *self.state.write() = CacheState::default();
        self.metrics.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!("Discovery cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        let hits = self.metrics.hits.load(Ordering::Relaxed);
        let misses = self.metrics.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            enabled: self.enabled,
            expiry_secs: self.expiry.as_secs(),
            entries: state.entries.len(),
            backends: state.entries.keys().copied().collect(),
            hits,
            misses,
            refreshes: self.metrics.refreshes.load(Ordering::Relaxed),
            invalidations: self.metrics.invalidations.load(Ordering::Relaxed),
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            last_discovery: state.refreshed_wall,
        }
    }

    fn is_valid(state: &CacheState, expiry: Duration) -> bool {
        !state.entries.is_empty()
            && state
                .refreshed_at
                .is_some_and(|at| at.elapsed() < expiry)
    }
}
