//! Error types for the Unified Replication Operator
//!
//! Provides structured error types for every stage of the replication
//! pipeline: discovery, backend selection, validation, translation and
//! adapter dispatch. Each pipeline error keeps its cause reachable through
//! [`std::error::Error::source`] and renders the whole chain in its message.

use crate::controller::selector::SelectionError;
use crate::domain::ports::Backend;
use crate::translation::TranslationError;
use std::time::Duration;
use thiserror::Error;

/// Stage of the replication pipeline an error originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Discovery,
    Selection,
    Validation,
    Translation,
    AdapterCreation,
    AdapterInit,
    Execution,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Discovery => write!(f, "discovery"),
            PipelineStage::Selection => write!(f, "selection"),
            PipelineStage::Validation => write!(f, "validation"),
            PipelineStage::Translation => write!(f, "translation"),
            PipelineStage::AdapterCreation => write!(f, "adapter-creation"),
            PipelineStage::AdapterInit => write!(f, "adapter-init"),
            PipelineStage::Execution => write!(f, "execution"),
        }
    }
}

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("operation cancelled")]
    Cancelled,

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Invalid resource {name}: {reason}")]
    InvalidResource { name: String, reason: String },

    // =========================================================================
    // Pipeline Stage Errors
    // =========================================================================
    #[error("backend discovery failed: {0}")]
    Discovery(#[source] Box<Error>),

    #[error("backend selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("backend validation failed for {backend}: {source}")]
    Validation {
        backend: Backend,
        #[source]
        source: Box<Error>,
    },

    #[error("state/mode translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("adapter creation failed for {backend}: {source}")]
    AdapterCreation {
        backend: Backend,
        #[source]
        source: Box<Error>,
    },

    #[error("adapter initialization failed for {backend}: {source}")]
    AdapterInit {
        backend: Backend,
        #[source]
        source: Box<Error>,
    },

    #[error("operation execution failed: {source}")]
    Execution {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Backend Errors
    // =========================================================================
    #[error("Backend not ready: {backend} ({status})")]
    BackendNotReady { backend: Backend, status: String },

    #[error("Backend {backend} lacks capability {capability} required by mode {mode}")]
    MissingCapability {
        backend: Backend,
        capability: String,
        mode: String,
    },

    #[error("No adapter registered for backend {backend}")]
    AdapterNotRegistered { backend: Backend },

    #[error("Adapter operation failed: {backend} - {operation}: {reason}")]
    AdapterOperation {
        backend: Backend,
        operation: String,
        reason: String,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Pipeline stage this error was raised in, if any
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Error::Discovery(_) => Some(PipelineStage::Discovery),
            Error::Selection(_) => Some(PipelineStage::Selection),
            Error::Validation { .. } => Some(PipelineStage::Validation),
            Error::Translation(_) => Some(PipelineStage::Translation),
            Error::AdapterCreation { .. } => Some(PipelineStage::AdapterCreation),
            Error::AdapterInit { .. } => Some(PipelineStage::AdapterInit),
            Error::Execution { .. } => Some(PipelineStage::Execution),
            _ => None,
        }
    }

    /// Innermost error of a pipeline chain
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Discovery(inner)
            | Error::Validation { source: inner, .. }
            | Error::AdapterCreation { source: inner, .. }
            | Error::AdapterInit { source: inner, .. }
            | Error::Execution { source: inner, .. } => inner.root_cause(),
            other => other,
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient I/O against control planes - retry with backoff
            Error::Kube(_)
            | Error::Cancelled
            | Error::Discovery(_)
            | Error::AdapterOperation { .. } => ErrorAction::RequeueWithBackoff,

            // Backend may show up or become ready later
            Error::Selection(SelectionError::BackendNotAvailable { .. })
            | Error::Selection(SelectionError::NoBackendsAvailable)
            | Error::BackendNotReady { .. } => ErrorAction::RequeueAfter(Duration::from_secs(60)),

            // Wrapping stages inherit the classification of their cause
            Error::Validation { source, .. }
            | Error::AdapterCreation { source, .. }
            | Error::AdapterInit { source, .. }
            | Error::Execution { source, .. } => source.action(),

            // Misconfiguration or unsupported values - wait for a spec change
            Error::Configuration(_)
            | Error::InvalidResource { .. }
            | Error::Selection(SelectionError::AmbiguousExtensions { .. })
            | Error::Selection(SelectionError::BoundBackendConflict { .. })
            | Error::Translation(_)
            | Error::MissingCapability { .. }
            | Error::AdapterNotRegistered { .. } => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::Kube(_) | Error::Cancelled | Error::AdapterOperation { .. }
        )
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;
