//! Operator Configuration
//!
//! Settings come from built-in defaults, then an optional YAML file, then
//! command-line flags (applied by the binary).
//!
//! ```yaml
//! controller:
//!   enableCaching: true
//!   cacheExpirySecs: 120
//!   failOnUnreadyBackend: false
//! adapters:
//!   fieldManager: unified-replication-operator
//!   trident:
//!     defaultReplicationSchedule: hourly
//! vocabulary:
//!   - backend: trident
//!     axis: state
//!     entries:
//!       source: promoted
//!       replica: established
//! ```

use crate::adapters::AdapterConfig;
use crate::controller::ControllerConfig;
use crate::domain::ports::Backend;
use crate::error::{Error, Result};
use crate::translation::{Axis, TranslationEngine, TranslationMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Replacement vocabulary for one backend axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyOverride {
    pub backend: Backend,
    pub axis: Axis,
    /// unified -> backend
    pub entries: BTreeMap<String, String>,
    /// Extra backend values accepted when reading status
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Complete operator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OperatorConfig {
    pub controller: ControllerConfig,
    pub adapters: AdapterConfig,
    pub vocabulary: Vec<VocabularyOverride>,
}

impl OperatorConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.controller.enable_caching && self.controller.cache_expiry_secs == 0 {
            return Err(Error::Configuration(
                "cacheExpirySecs must be positive when caching is enabled".into(),
            ));
        }
        self.controller.concurrency_limit()?;
        if self.adapters.field_manager.trim().is_empty() {
            return Err(Error::Configuration("fieldManager must not be empty".into()));
        }
        Ok(())
    }

    /// Build the translation engine: built-in vocabularies with overrides
    /// applied. Fails when any resulting vocabulary is inconsistent.
    pub fn translation_engine(&self) -> Result<TranslationEngine> {
        let mut builder = TranslationEngine::builder().with_defaults()?;
        for vocabulary in &self.vocabulary {
            let mut map = TranslationMap::from_forward(
                vocabulary.backend,
                vocabulary.axis,
                vocabulary.entries.clone(),
            )?;
            for (native, unified) in &vocabulary.aliases {
                map = map.with_alias(native.clone(), unified.clone());
            }
            info!(
                "Overriding {} vocabulary for {}",
                vocabulary.axis, vocabulary.backend
            );
            builder = builder.with_map(map);
        }
        Ok(builder.build()?)
    }
}
