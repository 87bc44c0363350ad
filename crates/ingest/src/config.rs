//! Configuration types for the ingest layer.
//!
//! [`IngestConfig`] decides which parser handles which format tag and how
//! large a batch may be before it is refused. It is cheap to clone and
//! deserializes from the `ingest:` section of the service YAML.
//!
//! ```rust
//! use ingest::IngestConfig;
//!
//! let config = IngestConfig::default();
//! config.validate().expect("defaults are valid");
//! assert_eq!(config.formats.get("xlsx").map(String::as_str), Some("excel"));
//! ```
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::BUILTIN_PARSERS;

/// Runtime configuration for parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Version of the ingest configuration, bumped on behavior changes.
    ///
    /// Default: `1`
    pub version: u32,

    /// Maximum accepted batch size in bytes.
    ///
    /// Files above the ceiling fail with
    /// [`IngestError::FileTooLarge`](crate::IngestError::FileTooLarge) before
    /// any decoding happens.
    ///
    /// Default: `None` (unlimited)
    pub max_file_bytes: Option<usize>,

    /// Format tag to parser id.
    ///
    /// Tags are file extensions without the dot, matched case-insensitively.
    /// Parser ids must be one of `csv`, `tsv`, `excel`, `json`, `xml`, `pdf`.
    ///
    /// Default: the built-in table from [`default_formats`].
    pub formats: BTreeMap<String, String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            version: 1,
            max_file_bytes: None,
            formats: default_formats(),
        }
    }
}

/// The built-in format table: `csv`, `tsv`, `xls`, `xlsx`, `json`, `xml`, `pdf`.
pub fn default_formats() -> BTreeMap<String, String> {
    [
        ("csv", "csv"),
        ("tsv", "tsv"),
        ("xls", "excel"),
        ("xlsx", "excel"),
        ("json", "json"),
        ("xml", "xml"),
        ("pdf", "pdf"),
    ]
    .into_iter()
    .map(|(tag, parser)| (tag.to_string(), parser.to_string()))
    .collect()
}

/// Errors that can occur when validating an [`IngestConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A format tag points at a parser id that does not exist.
    #[error("format '{format}' maps to unknown parser '{parser}'")]
    UnknownParser { format: String, parser: String },

    /// A format tag is empty or contains a dot.
    #[error("invalid format tag '{0}'")]
    InvalidFormatTag(String),

    /// `max_file_bytes` was set to zero.
    #[error("max_file_bytes must be greater than zero")]
    ZeroFileLimit,
}

impl IngestConfig {
    /// Validate the configuration for internal consistency.
    ///
    /// Run this at startup; a registry built from an invalid configuration
    /// would fail every batch of the affected format at runtime instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_bytes == Some(0) {
            return Err(ConfigError::ZeroFileLimit);
        }
        for (format, parser) in &self.formats {
            let tag = format.trim();
            if tag.is_empty() || tag.contains('.') {
                return Err(ConfigError::InvalidFormatTag(format.clone()));
            }
            if !BUILTIN_PARSERS.contains(&parser.as_str()) {
                return Err(ConfigError::UnknownParser {
                    format: format.clone(),
                    parser: parser.clone(),
                });
            }
        }
        Ok(())
    }
}
