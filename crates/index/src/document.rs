use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::compression::CompressionConfig;
use crate::{IndexBackend, IndexError};

const DOC_PREFIX: &str = "doc";

/// Append-only document collections.
///
/// The warehouse, the error store and the audit log all go through this
/// trait. Documents come back from [`find_all`](DocumentStore::find_all) in
/// insertion order.
pub trait DocumentStore: Send + Sync {
    /// Append `docs` to `collection` in one write. Returns how many were
    /// stored.
    fn insert_many(&self, collection: &str, docs: &[Value]) -> Result<usize, IndexError>;

    fn insert_one(&self, collection: &str, doc: &Value) -> Result<(), IndexError> {
        self.insert_many(collection, std::slice::from_ref(doc))
            .map(|_| ())
    }

    /// Append to several collections in one write. Returns the count
    /// stored per group, in order.
    fn insert_grouped(&self, groups: &[(&str, &[Value])]) -> Result<Vec<usize>, IndexError> {
        groups
            .iter()
            .map(|(collection, docs)| self.insert_many(collection, docs))
            .collect()
    }

    fn find_all(&self, collection: &str) -> Result<Vec<Value>, IndexError>;

    fn count(&self, collection: &str) -> Result<usize, IndexError> {
        self.find_all(collection).map(|docs| docs.len())
    }
}

/// [`DocumentStore`] over an [`IndexBackend`].
///
/// Keys are `doc/{collection}/{uuid_v7}-{position}`; UUIDv7 is time ordered,
/// so a prefix scan of the collection is insertion order.
#[derive(Clone)]
pub struct KvDocumentStore {
    backend: Arc<dyn IndexBackend>,
    compression: CompressionConfig,
}

impl KvDocumentStore {
    pub fn new(backend: Arc<dyn IndexBackend>, compression: CompressionConfig) -> Self {
        Self {
            backend,
            compression,
        }
    }

    pub fn backend(&self) -> &Arc<dyn IndexBackend> {
        &self.backend
    }

    fn collection_prefix(collection: &str) -> String {
        format!("{DOC_PREFIX}/{collection}/")
    }
}

impl std::fmt::Debug for KvDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvDocumentStore")
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

impl DocumentStore for KvDocumentStore {
    fn insert_many(&self, collection: &str, docs: &[Value]) -> Result<usize, IndexError> {
        self.insert_grouped(&[(collection, docs)])
            .map(|counts| counts.iter().sum())
    }

    /// All groups land in one backend batch, so either every document is
    /// stored or none is.
    fn insert_grouped(&self, groups: &[(&str, &[Value])]) -> Result<Vec<usize>, IndexError> {
        let mut entries = Vec::new();
        for (collection, docs) in groups {
            if docs.is_empty() {
                continue;
            }
            let prefix = Self::collection_prefix(collection);
            let batch_id = Uuid::now_v7();
            for (idx, doc) in docs.iter().enumerate() {
                entries.push((
                    format!("{prefix}{batch_id}-{idx:010}"),
                    self.compression.encode_json(doc)?,
                ));
            }
        }
        if !entries.is_empty() {
            self.backend.batch_put(entries)?;
        }
        Ok(groups.iter().map(|(_, docs)| docs.len()).collect())
    }

    fn find_all(&self, collection: &str) -> Result<Vec<Value>, IndexError> {
        let mut docs = Vec::new();
        self.backend
            .scan_prefix(&Self::collection_prefix(collection), &mut |_, data| {
                docs.push(self.compression.decode_json(data)?);
                Ok(())
            })?;
        Ok(docs)
    }

    fn count(&self, collection: &str) -> Result<usize, IndexError> {
        let mut count = 0;
        self.backend
            .scan_prefix(&Self::collection_prefix(collection), &mut |_, _| {
                count += 1;
                Ok(())
            })?;
        Ok(count)
    }
}
