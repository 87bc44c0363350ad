//! Configuration for record normalization.
//!
//! ```rust
//! use canonical::NormalizeConfig;
//!
//! let config = NormalizeConfig::default();
//! assert_eq!(config.version, 1);
//! assert_eq!(config.internal_keys, vec!["_id".to_string()]);
//! assert!(config.validate().is_ok());
//! ```
use serde::{Deserialize, Serialize};

use crate::error::CanonicalError;

/// Controls how raw records are folded into normalized records.
///
/// `version` feeds into record fingerprints: two deployments that normalize
/// differently must not share fingerprints, so bump it with any behavior
/// change. Version 0 is reserved and rejected by [`NormalizeConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub version: u32,

    /// Keys dropped at every nesting level, compared after lowercasing.
    ///
    /// Default: `["_id"]`, the document store's own identifier.
    pub internal_keys: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            internal_keys: vec!["_id".to_string()],
        }
    }
}

impl NormalizeConfig {
    pub fn validate(&self) -> Result<(), CanonicalError> {
        if self.version == 0 {
            return Err(CanonicalError::InvalidConfig(
                "version must be at least 1".into(),
            ));
        }
        if self.internal_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(CanonicalError::InvalidConfig(
                "internal_keys must not contain empty keys".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn is_internal(&self, folded_key: &str) -> bool {
        self.internal_keys
            .iter()
            .any(|k| k.to_lowercase() == folded_key)
    }
}
