//! Translation errors
//!
//! A tagged error value: callers branch on [`TranslationErrorKind`] to tell a
//! value the intent used that a backend does not know apart from a broken
//! vocabulary table.

use crate::domain::ports::Backend;
use thiserror::Error;

/// Category of a translation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationErrorKind {
    /// Empty or malformed value
    InvalidValue,
    /// No vocabulary registered for the backend
    UnsupportedMapping,
    /// Forward and reverse maps disagree
    InconsistentMapping,
    /// Value has no entry in the vocabulary
    MissingMapping,
}

impl std::fmt::Display for TranslationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslationErrorKind::InvalidValue => write!(f, "invalid_value"),
            TranslationErrorKind::UnsupportedMapping => write!(f, "unsupported_mapping"),
            TranslationErrorKind::InconsistentMapping => write!(f, "inconsistent_mapping"),
            TranslationErrorKind::MissingMapping => write!(f, "missing_mapping"),
        }
    }
}

/// Error raised while converting between unified and backend vocabulary
#[derive(Error, Debug)]
#[error("translation error ({kind}) for backend {backend} field {field}='{value}': {message}")]
pub struct TranslationError {
    pub kind: TranslationErrorKind,
    pub backend: Backend,
    /// "state" or "mode"
    pub field: String,
    /// Offending value
    pub value: String,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TranslationError {
    pub fn new(
        kind: TranslationErrorKind,
        backend: Backend,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            backend,
            field: field.into(),
            value: value.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Attach an underlying cause
    pub fn with_cause(mut self, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn is_missing(&self) -> bool {
        self.kind == TranslationErrorKind::MissingMapping
    }

    pub fn is_inconsistent(&self) -> bool {
        self.kind == TranslationErrorKind::InconsistentMapping
    }
}

/// Result type for translation operations
pub type TranslationResult<T> = std::result::Result<T, TranslationError>;
