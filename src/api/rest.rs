//! REST API Handlers
//!
//! Read-mostly introspection endpoints over the controller engine: discovered
//! backends, translation vocabularies, discovery cache state and operation
//! counters, plus a dry-run backend selection.

use crate::controller::{CacheStats, ControllerEngine};
use crate::crd::{UnifiedVolumeReplication, UnifiedVolumeReplicationSpec};
use crate::domain::ports::{Backend, BackendStatus, Capability, DiscoveryResult};
use crate::translation::{Axis, TranslationMap};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Discovered backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfoResponse {
    pub backend: Backend,
    pub status: BackendStatus,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    pub capabilities: Vec<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl From<DiscoveryResult> for BackendInfoResponse {
    fn from(result: DiscoveryResult) -> Self {
        Self {
            backend: result.backend,
            ready: result.status.is_ready(),
            status: result.status,
            api_group: result.api_group,
            capabilities: result.capabilities.into_iter().collect(),
            message: result.message,
            discovered_at: result.discovered_at,
        }
    }
}

/// One axis of a backend vocabulary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisVocabulary {
    /// unified -> backend
    pub values: BTreeMap<String, String>,
    /// backend values accepted only when reading status
    pub aliases: BTreeMap<String, String>,
}

impl From<&TranslationMap> for AxisVocabulary {
    fn from(map: &TranslationMap) -> Self {
        Self {
            values: map
                .entries()
                .map(|(u, b)| (u.to_string(), b.to_string()))
                .collect(),
            aliases: map
                .aliases()
                .map(|(b, u)| (b.to_string(), u.to_string()))
                .collect(),
        }
    }
}

/// Vocabulary of a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyResponse {
    pub backend: Backend,
    pub states: AxisVocabulary,
    pub modes: AxisVocabulary,
}

/// Dry-run selection result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub backend: Backend,
    pub state: String,
    pub mode: String,
}

/// Operation counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatsResponse {
    pub operation: String,
    pub succeeded: u64,
    pub failed: u64,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn api_error(status: StatusCode, error: &str, message: String) -> axum::response::Response {
    (
        status,
        Json(ApiErrorResponse {
            error: error.into(),
            message,
            details: None,
        }),
    )
        .into_response()
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    engine: Arc<ControllerEngine>,
    cancel: CancellationToken,
}

impl RestRouter {
    pub fn new(engine: Arc<ControllerEngine>, cancel: CancellationToken) -> Self {
        Self { engine, cancel }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            engine: self.engine,
            cancel: self.cancel,
        };

        Router::new()
            // Backend endpoints
            .route("/v1/backends", get(list_backends))
            .route("/v1/backends/:backend/vocabulary", get(get_vocabulary))
            // Selection dry run
            .route("/v1/select", post(select_backend))
            // Cache endpoints
            .route("/v1/cache", get(get_cache))
            .route("/v1/cache/invalidate", post(invalidate_cache))
            // Counters
            .route("/v1/operations", get(get_operations))
            // Health endpoints
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    engine: Arc<ControllerEngine>,
    cancel: CancellationToken,
}

// =============================================================================
// Handlers
// =============================================================================

/// List discovered backends (served from the discovery cache when valid)
async fn list_backends(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.discover_backends(&state.cancel).await {
        Ok(results) => {
            let backends: Vec<BackendInfoResponse> =
                results.into_iter().map(BackendInfoResponse::from).collect();
            (StatusCode::OK, Json(backends)).into_response()
        }
        Err(e) => api_error(StatusCode::SERVICE_UNAVAILABLE, "discovery_failed", e.to_string()),
    }
}

/// Vocabulary of one backend
async fn get_vocabulary(
    State(state): State<AppState>,
    Path(backend): Path<String>,
) -> impl IntoResponse {
    let Some(backend) = Backend::parse(&backend) else {
        return api_error(
            StatusCode::BAD_REQUEST,
            "invalid_backend",
            format!("Unknown backend: {}. Use 'ceph', 'trident', or 'powerstore'", backend),
        );
    };

    match state.engine.translator().vocabulary(backend) {
        Some(vocabulary) => (
            StatusCode::OK,
            Json(VocabularyResponse {
                backend,
                states: AxisVocabulary::from(vocabulary.map(Axis::State)),
                modes: AxisVocabulary::from(vocabulary.map(Axis::Mode)),
            }),
        )
            .into_response(),
        None => api_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No vocabulary registered for {}", backend),
        ),
    }
}

/// Select a backend for an intent spec without touching any backend
async fn select_backend(
    State(state): State<AppState>,
    Json(spec): Json<UnifiedVolumeReplicationSpec>,
) -> impl IntoResponse {
    let intent = UnifiedVolumeReplication::new("dry-run", spec);
    let backend = match state.engine.select_backend(&state.cancel, &intent).await {
        Ok(backend) => backend,
        Err(e) => {
            let status = if e.is_retryable() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            return api_error(status, "selection_failed", e.to_string());
        }
    };
    debug!("Dry-run selection chose {}", backend);

    let translator = state.engine.translator();
    let translated = translator
        .translate_state_to_backend(backend, intent.spec.replication_state.as_str())
        .and_then(|native_state| {
            translator
                .translate_mode_to_backend(backend, intent.spec.replication_mode.as_str())
                .map(|native_mode| (native_state, native_mode))
        });

    match translated {
        Ok((state, mode)) => (
            StatusCode::OK,
            Json(SelectionResponse {
                backend,
                state,
                mode,
            }),
        )
            .into_response(),
        Err(e) => api_error(StatusCode::UNPROCESSABLE_ENTITY, "translation_failed", e.to_string()),
    }
}

/// Discovery cache statistics
async fn get_cache(State(state): State<AppState>) -> impl IntoResponse {
    let stats: CacheStats = state.engine.cache_stats();
    (StatusCode::OK, Json(stats))
}

/// Drop cached discovery results
async fn invalidate_cache(State(state): State<AppState>) -> impl IntoResponse {
    info!("Discovery cache invalidated via API");
    state.engine.invalidate_cache();
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "invalidated" })),
    )
}

/// Per-operation counters
async fn get_operations(State(state): State<AppState>) -> impl IntoResponse {
    let stats: Vec<OperationStatsResponse> = state
        .engine
        .operation_stats()
        .into_iter()
        .map(|(operation, count)| OperationStatsResponse {
            operation: operation.to_string(),
            succeeded: count.succeeded,
            failed: count.failed,
        })
        .collect();
    (StatusCode::OK, Json(stats))
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.engine.registry().backends().is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no adapters registered")
    } else {
        (StatusCode::OK, "ready")
    }
}
