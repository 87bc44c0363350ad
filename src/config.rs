//! YAML configuration for the whole mart.
//!
//! One file configures every stage. Every section is optional; missing
//! sections and fields fall back to the defaults, which reproduce the
//! collection names the warehouse has always used.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "nightly batches"
//!
//! ingest:
//!   max_file_bytes: 52428800
//!   formats:
//!     csv: csv
//!     txt: tsv
//!
//! normalize:
//!   internal_keys: ["_id"]
//!
//! validation:
//!   max_workers: 8
//!   parallel_threshold: 256
//!
//! stores:
//!   backend: redb
//!   path: /data/mart.redb
//!   compression: zstd
//!   level: 3
//!   domains:
//!     upi: Customer_UPI_Transactions
//!     retail: Customer_Retails_Transactions
//!   error_store: Error_Records
//!   audit_store: Audit
//!
//! aggregate:
//!   dedupe: true
//!   strip_identity: false
//!
//! naming:
//!   domain_keywords:
//!     - { keyword: upi, domain: upi }
//!     - { keyword: credit, domain: credit_card }
//!
//! logging:
//!   level: info
//!   json: true
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use canonical::NormalizeConfig;
use index::{
    AggregatorConfig, BackendConfig, CompressionCodec, CompressionConfig, StoreNames,
};
use ingest::IngestConfig;
use schema::{Domain, ValidationConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MartConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub normalize: NormalizeConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub stores: StoreConfig,

    #[serde(default)]
    pub aggregate: AggregatorConfig,

    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MartConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: MartConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.ingest.validate().map_err(invalid)?;
        self.normalize.validate().map_err(invalid)?;
        self.validation.validate().map_err(invalid)?;
        self.stores.validate()?;
        self.aggregate.validate().map_err(invalid)?;
        self.naming.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Default for MartConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            ingest: IngestConfig::default(),
            normalize: NormalizeConfig::default(),
            validation: ValidationConfig::default(),
            stores: StoreConfig::default(),
            aggregate: AggregatorConfig::default(),
            naming: NamingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn invalid(err: impl std::fmt::Display) -> ConfigLoadError {
    ConfigLoadError::Validation(err.to_string())
}

/// Which backend holds the stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    InMemory,
    Redb,
}

/// Storage configuration: backend, value encoding and collection names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,

    /// Database file; required for `redb`.
    pub path: Option<String>,

    pub compression: CompressionCodec,

    /// Zstd level, 1-22. Ignored for `none`.
    pub level: i32,

    /// Warehouse collection per domain.
    pub domains: BTreeMap<Domain, String>,

    pub error_store: String,

    pub audit_store: String,

    /// Key prefix of the customer aggregate.
    pub aggregate_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let names = StoreNames::default();
        Self {
            backend: BackendKind::InMemory,
            path: None,
            compression: CompressionCodec::Zstd,
            level: CompressionConfig::default().level,
            domains: names.domains,
            error_store: names.error_store,
            audit_store: names.audit_store,
            aggregate_prefix: "agg".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn backend_config(&self) -> BackendConfig {
        match (self.backend, &self.path) {
            (BackendKind::Redb, Some(path)) => BackendConfig::redb(path.clone()),
            _ => BackendConfig::InMemory,
        }
    }

    pub fn compression_config(&self) -> CompressionConfig {
        CompressionConfig::new(self.compression, self.level)
    }

    pub fn store_names(&self) -> StoreNames {
        StoreNames {
            domains: self.domains.clone(),
            error_store: self.error_store.clone(),
            audit_store: self.audit_store.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.backend == BackendKind::Redb && self.path.is_none() {
            return Err(ConfigLoadError::Validation(
                "stores.path is required when backend is 'redb'".to_string(),
            ));
        }
        let prefix = self.aggregate_prefix.trim();
        if prefix.is_empty() || prefix == "doc" || prefix.contains('/') {
            return Err(ConfigLoadError::Validation(format!(
                "stores.aggregate_prefix '{}' is not usable",
                self.aggregate_prefix
            )));
        }
        self.compression_config().validate().map_err(invalid)?;
        self.store_names().validate().map_err(invalid)?;
        Ok(())
    }
}

/// One file-name keyword and the domain it selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainKeyword {
    pub keyword: String,
    pub domain: Domain,
}

/// File-naming convention: the first keyword found in the file name picks
/// the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub domain_keywords: Vec<DomainKeyword>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        let domain_keywords = [
            ("upi", Domain::Upi),
            ("credit", Domain::CreditCard),
            ("trade", Domain::Trade),
            ("retail", Domain::Retail),
            ("customer", Domain::CustomerProfile),
        ]
        .into_iter()
        .map(|(keyword, domain)| DomainKeyword {
            keyword: keyword.to_string(),
            domain,
        })
        .collect();
        Self { domain_keywords }
    }
}

impl NamingConfig {
    /// Domain for `file_name`, matched case-insensitively in keyword order.
    ///
    /// ```rust
    /// use schema::Domain;
    /// use txmart::config::NamingConfig;
    ///
    /// let naming = NamingConfig::default();
    /// assert_eq!(naming.detect("Customer_UPI_2024.xlsx"), Some(Domain::Upi));
    /// assert_eq!(naming.detect("customers.csv"), Some(Domain::CustomerProfile));
    /// assert_eq!(naming.detect("ledger.csv"), None);
    /// ```
    pub fn detect(&self, file_name: &str) -> Option<Domain> {
        let name = file_name.to_lowercase();
        self.domain_keywords
            .iter()
            .find(|entry| name.contains(&entry.keyword.to_lowercase()))
            .map(|entry| entry.domain)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if let Some(entry) = self
            .domain_keywords
            .iter()
            .find(|entry| entry.keyword.trim().is_empty())
        {
            return Err(ConfigLoadError::Validation(format!(
                "naming keyword for {} is empty",
                entry.domain
            )));
        }
        Ok(())
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` overrides it.
    pub level: String,
    /// JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        tracing_subscriber::EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|err| ConfigLoadError::Validation(format!("logging.level: {err}")))
    }
}
