//! # Mart Index
//!
//! Storage for everything the pipeline keeps: warehouse collections (one per
//! domain), the shared error collection, the audit log and the
//! customer-centric aggregate.
//!
//! ## Layers
//!
//! - [`IndexBackend`]: ordered key-value storage. [`InMemoryBackend`] for
//!   tests, [`RedbBackend`] on disk (feature `backend-redb`, on by default).
//!   [`BackendConfig::build`] opens one shared handle per process.
//! - [`DocumentStore`]: append-only JSON collections as key prefixes, read
//!   back in insertion order.
//! - [`WarehouseWriter`]: accepted records into the domain collection,
//!   rejection diagnostics into the error collection.
//! - [`CustomerAggregator`] over an [`AggregateStore`]: one document per
//!   customer, one bucket per domain, append-only, de-duplicated by record
//!   fingerprint unless configured otherwise.
//!
//! Values are JSON, zstd-compressed by default ([`CompressionConfig`]).
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use index::{
//!     AggregateStore, AggregatorConfig, BackendConfig, CompressionConfig, CustomerAggregator,
//!     DocumentStore, KvAggregateStore, KvDocumentStore,
//! };
//! use serde_json::json;
//!
//! let backend = BackendConfig::in_memory().build().unwrap();
//! let docs = KvDocumentStore::new(backend.clone(), CompressionConfig::default());
//! docs.insert_one("Audit", &json!({"status": "SUCCESS"})).unwrap();
//! assert_eq!(docs.count("Audit").unwrap(), 1);
//!
//! let store = KvAggregateStore::new(backend, CompressionConfig::default());
//! let aggregator = CustomerAggregator::new(Arc::new(store), AggregatorConfig::default()).unwrap();
//! assert!(aggregator.store().customers().unwrap().is_empty());
//! ```

mod aggregate;
mod backend;
mod compression;
mod document;
mod warehouse;

pub use aggregate::{
    AggregateStore, AggregationSummary, AggregatorConfig, AppendOutcome, CustomerAggregate,
    CustomerAggregator, KvAggregateStore,
};
#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use backend::{BackendConfig, InMemoryBackend, IndexBackend};
pub use compression::{CompressionCodec, CompressionConfig};
pub use document::{DocumentStore, KvDocumentStore};
pub use warehouse::{ErrorRecord, StoreNames, WarehouseWriter, WriteSummary};

use thiserror::Error;

/// Storage failures. Any of these fails the whole batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IndexError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization encode error: {0}")]
    Encode(String),
    #[error("Serialization decode error: {0}")]
    Decode(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("no store configured for domain '{0}'")]
    UnknownStore(String),
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Compression(e.to_string())
    }
}

impl IndexError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}
