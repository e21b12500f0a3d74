//! Bidirectional translation maps
//!
//! A [`TranslationMap`] holds one axis (state or mode) of one backend's
//! vocabulary. The reverse direction is derived from the forward table, so a
//! second table never has to be authored by hand. Reverse-only aliases are
//! allowed for backend values that collapse onto an existing unified value.

use super::error::{TranslationError, TranslationErrorKind, TranslationResult};
use crate::domain::ports::Backend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which vocabulary a map covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    State,
    Mode,
}

impl Axis {
    /// Field name used in errors
    pub fn field(&self) -> &'static str {
        match self {
            Axis::State => "state",
            Axis::Mode => "mode",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field())
    }
}

/// Unified <-> backend mapping for a single (backend, axis) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationMap {
    backend: Backend,
    axis: Axis,
    /// unified -> backend
    forward: BTreeMap<String, String>,
    /// backend -> unified
    reverse: BTreeMap<String, String>,
}

impl TranslationMap {
    /// Build a map from its forward table, deriving the reverse table
    ///
    /// Fails when a unified value is listed twice, or when two unified values
    /// claim the same backend value.
    pub fn from_forward<I, K, V>(backend: Backend, axis: Axis, entries: I) -> TranslationResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut forward: BTreeMap<String, String> = BTreeMap::new();
        for (unified, native) in entries {
            let (unified, native) = (unified.into(), native.into());
            if unified.trim().is_empty() || native.trim().is_empty() {
                return Err(TranslationError::new(
                    TranslationErrorKind::InvalidValue,
                    backend,
                    axis.field(),
                    format!("{}->{}", unified, native),
                    "vocabulary entries must not be empty",
                ));
            }
            if let Some(previous) = forward.get(&unified) {
                return Err(TranslationError::new(
                    TranslationErrorKind::InconsistentMapping,
                    backend,
                    axis.field(),
                    unified.clone(),
                    format!("unified value mapped to both '{}' and '{}'", previous, native),
                ));
            }
            forward.insert(unified, native);
        }

        let reverse = derive_reverse(backend, axis, &forward)?;

        Ok(Self {
            backend,
            axis,
            forward,
            reverse,
        })
    }

    /// Assemble a map from independently authored tables without checking them
    ///
    /// Use [`TranslationMap::validate`] before serving translations from it.
    pub fn from_parts(
        backend: Backend,
        axis: Axis,
        forward: BTreeMap<String, String>,
        reverse: BTreeMap<String, String>,
    ) -> Self {
        Self {
            backend,
            axis,
            forward,
            reverse,
        }
    }

    /// Accept an extra backend value on the reverse direction only
    pub fn with_alias(mut self, native: impl Into<String>, unified: impl Into<String>) -> Self {
        self.reverse.insert(native.into(), unified.into());
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Translate a unified value to the backend's vocabulary
    pub fn to_backend(&self, unified: &str) -> TranslationResult<&str> {
        self.check_value(unified)?;
        self.forward.get(unified).map(String::as_str).ok_or_else(|| {
            self.error(
                TranslationErrorKind::MissingMapping,
                unified,
                format!("no {} value for unified {}", self.backend, self.axis),
            )
        })
    }

    /// Translate a backend value to unified vocabulary
    pub fn from_backend(&self, native: &str) -> TranslationResult<&str> {
        self.check_value(native)?;
        self.reverse.get(native).map(String::as_str).ok_or_else(|| {
            self.error(
                TranslationErrorKind::MissingMapping,
                native,
                format!("no unified value for {} {}", self.backend, self.axis),
            )
        })
    }

    /// Re-derive the reverse table and compare it with the stored one
    ///
    /// Every forward entry must round-trip exactly, and every reverse entry
    /// (aliases included) must point at a unified value the forward table has.
    pub fn validate(&self) -> TranslationResult<()> {
        let derived = derive_reverse(self.backend, self.axis, &self.forward)?;

        for (native, unified) in &derived {
            match self.reverse.get(native) {
                Some(stored) if stored == unified => {}
                Some(stored) => {
                    return Err(self.error(
                        TranslationErrorKind::InconsistentMapping,
                        unified,
                        format!(
                            "round trip diverges: '{}' -> '{}' -> '{}'",
                            unified, native, stored
                        ),
                    ));
                }
                None => {
                    return Err(self.error(
                        TranslationErrorKind::InconsistentMapping,
                        unified,
                        format!(
                            "round trip broken: '{}' -> '{}' -> <missing>",
                            unified, native
                        ),
                    ));
                }
            }
        }

        for (native, unified) in &self.reverse {
            if !self.forward.contains_key(unified) {
                return Err(self.error(
                    TranslationErrorKind::InconsistentMapping,
                    native,
                    format!(
                        "reverse entry '{}' -> '{}' targets a unified value absent from the forward map",
                        native, unified
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Unified-side domain, sorted
    pub fn unified_values(&self) -> Vec<String> {
        self.forward.keys().cloned().collect()
    }

    /// Forward table entries, sorted by unified value
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(u, b)| (u.as_str(), b.as_str()))
    }

    /// Backend values accepted on the reverse direction that are not forward targets
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.reverse
            .iter()
            .filter(|(native, unified)| self.forward.get(*unified) != Some(*native))
            .map(|(b, u)| (b.as_str(), u.as_str()))
    }

    fn check_value(&self, value: &str) -> TranslationResult<()> {
        if value.trim().is_empty() {
            return Err(self.error(
                TranslationErrorKind::InvalidValue,
                value,
                format!("empty {} value", self.axis),
            ));
        }
        Ok(())
    }

    fn error(
        &self,
        kind: TranslationErrorKind,
        value: &str,
        message: impl Into<String>,
    ) -> TranslationError {
        TranslationError::new(kind, self.backend, self.axis.field(), value, message)
    }
}

fn derive_reverse(
    backend: Backend,
    axis: Axis,
    forward: &BTreeMap<String, String>,
) -> TranslationResult<BTreeMap<String, String>> {
    let mut reverse: BTreeMap<String, String> = BTreeMap::new();
    for (unified, native) in forward {
        if let Some(previous) = reverse.insert(native.clone(), unified.clone()) {
            return Err(TranslationError::new(
                TranslationErrorKind::InconsistentMapping,
                backend,
                axis.field(),
                native.clone(),
                format!(
                    "backend value claimed by both '{}' and '{}'",
                    previous, unified
                ),
            ));
        }
    }
    Ok(reverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn trident_states() -> TranslationMap {
        TranslationMap::from_forward(
            Backend::Trident,
            Axis::State,
            [("primary", "established"), ("secondary", "reestablishing")],
        )
        .unwrap()
    }

    #[test]
    fn test_forward_and_reverse_lookup() {
        let map = trident_states();

        assert_eq!(map.to_backend("primary").unwrap(), "established");
        assert_eq!(map.from_backend("established").unwrap(), "primary");
        assert_eq!(map.from_backend("reestablishing").unwrap(), "secondary");
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let map = trident_states();

        let err = map.to_backend("archived").unwrap_err();
        assert_matches!(err.kind, TranslationErrorKind::MissingMapping);
        assert_eq!(err.field, "state");
        assert_eq!(err.value, "archived");

        let err = map.from_backend("  ").unwrap_err();
        assert_matches!(err.kind, TranslationErrorKind::InvalidValue);
    }

    #[test]
    fn test_many_to_one_forward_is_rejected() {
        let err = TranslationMap::from_forward(
            Backend::Ceph,
            Axis::Mode,
            [("synchronous", "sync"), ("eventual", "sync")],
        )
        .unwrap_err();

        assert!(err.is_inconsistent());
        assert_eq!(err.value, "sync");
    }

    #[test]
    fn test_duplicate_unified_key_is_rejected() {
        let err = TranslationMap::from_forward(
            Backend::Trident,
            Axis::State,
            [("source", "promoted"), ("source", "established")],
        )
        .unwrap_err();

        assert!(err.is_inconsistent());
        assert_eq!(err.value, "source");
        assert!(err.message.contains("'promoted' and 'established'"));
    }

    #[test]
    fn test_validate_accepts_derived_map_and_aliases() {
        let map = trident_states().with_alias("reestablished", "secondary");

        map.validate().unwrap();
        assert_eq!(map.from_backend("reestablished").unwrap(), "secondary");
        assert_eq!(
            map.aliases().collect::<Vec<_>>(),
            vec![("reestablished", "secondary")]
        );
    }

    #[test]
    fn test_validate_reports_mismatched_reverse_entry() {
        let forward = BTreeMap::from([
            ("primary".to_string(), "established".to_string()),
            ("secondary".to_string(), "reestablishing".to_string()),
        ]);
        let reverse = BTreeMap::from([
            ("established".to_string(), "secondary".to_string()),
            ("reestablishing".to_string(), "secondary".to_string()),
        ]);
        let map = TranslationMap::from_parts(Backend::Trident, Axis::State, forward, reverse);

        let err = map.validate().unwrap_err();
        assert_matches!(err.kind, TranslationErrorKind::InconsistentMapping);
        assert!(err.message.contains("'primary' -> 'established' -> 'secondary'"));
    }

    #[test]
    fn test_validate_reports_missing_reverse_entry() {
        let forward = BTreeMap::from([("source".to_string(), "primary".to_string())]);
        let map = TranslationMap::from_parts(Backend::Ceph, Axis::State, forward, BTreeMap::new());

        let err = map.validate().unwrap_err();
        assert!(err.is_inconsistent());
        assert!(err.message.contains("<missing>"));
    }

    #[test]
    fn test_validate_reports_orphan_reverse_entry() {
        let map = trident_states().with_alias("broken", "archived");

        let err = map.validate().unwrap_err();
        assert!(err.is_inconsistent());
        assert_eq!(err.value, "broken");
    }
}
