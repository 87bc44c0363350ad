//! Per-batch audit trail.
//!
//! Every call to [`Pipeline::process_batch`](crate::Pipeline::process_batch)
//! produces exactly one [`AuditSummary`], successful or not, and hands it to
//! the configured [`AuditSink`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use index::{DocumentStore, IndexError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Final state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Failed => "FAILED",
        }
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub file_name: String,
    pub file_type: String,
    pub file_size_bytes: usize,
    pub status: AuditStatus,
    pub processed_rows: usize,
    pub accepted_rows: usize,
    pub error_rows: usize,
    /// Failure text for FAILED batches; a rejection note otherwise.
    pub comments: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AuditError {
    #[error("audit store failure: {0}")]
    Store(#[from] IndexError),
    #[error("audit summary could not be encoded: {0}")]
    Encode(String),
    #[error("audit sink lock poisoned")]
    Poisoned,
}

/// Receives one summary per batch.
pub trait AuditSink: Send + Sync {
    fn record(&self, summary: &AuditSummary) -> Result<(), AuditError>;
}

/// Emits the summary as a structured `audit_summary` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, summary: &AuditSummary) -> Result<(), AuditError> {
        info!(
            file_name = %summary.file_name,
            file_type = %summary.file_type,
            file_size_bytes = summary.file_size_bytes,
            status = summary.status.as_str(),
            processed_rows = summary.processed_rows,
            accepted_rows = summary.accepted_rows,
            error_rows = summary.error_rows,
            comments = summary.comments.as_deref().unwrap_or(""),
            "audit_summary"
        );
        Ok(())
    }
}

/// Appends summaries to a document collection.
#[derive(Clone)]
pub struct DocumentAuditSink {
    docs: Arc<dyn DocumentStore>,
    collection: String,
}

impl DocumentAuditSink {
    pub fn new(docs: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            docs,
            collection: collection.into(),
        }
    }

    /// Every stored summary, oldest first.
    pub fn summaries(&self) -> Result<Vec<AuditSummary>, AuditError> {
        self.docs
            .find_all(&self.collection)?
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| AuditError::Encode(e.to_string()))
            })
            .collect()
    }
}

impl std::fmt::Debug for DocumentAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAuditSink")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl AuditSink for DocumentAuditSink {
    fn record(&self, summary: &AuditSummary) -> Result<(), AuditError> {
        let doc = serde_json::to_value(summary).map_err(|e| AuditError::Encode(e.to_string()))?;
        self.docs.insert_one(&self.collection, &doc)?;
        Ok(())
    }
}

/// Keeps summaries in memory; for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditSummary>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditSummary> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, summary: &AuditSummary) -> Result<(), AuditError> {
        self.entries
            .lock()
            .map_err(|_| AuditError::Poisoned)?
            .push(summary.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::{CompressionConfig, InMemoryBackend, KvDocumentStore};
    use serde_json::json;

    fn summary(status: AuditStatus) -> AuditSummary {
        let now = Utc::now();
        AuditSummary {
            file_name: "retail.csv".into(),
            file_type: "csv".into(),
            file_size_bytes: 120,
            status,
            processed_rows: 3,
            accepted_rows: 2,
            error_rows: 1,
            comments: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn status_serializes_upper_case() {
        let value = serde_json::to_value(summary(AuditStatus::Failed)).unwrap();
        assert_eq!(value["status"], json!("FAILED"));
        assert_eq!(AuditStatus::Success.as_str(), "SUCCESS");
    }

    #[test]
    fn document_sink_round_trips() {
        let docs = KvDocumentStore::new(Arc::new(InMemoryBackend::new()), CompressionConfig::default());
        let sink = DocumentAuditSink::new(Arc::new(docs), "Audit");
        let first = summary(AuditStatus::Success);
        sink.record(&first).unwrap();
        sink.record(&summary(AuditStatus::Failed)).unwrap();

        let stored = sink.summaries().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], first);
        assert_eq!(stored[1].status, AuditStatus::Failed);
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        sink.record(&summary(AuditStatus::Failed)).unwrap();
        sink.record(&summary(AuditStatus::Success)).unwrap();
        let statuses: Vec<AuditStatus> = sink.entries().iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec![AuditStatus::Failed, AuditStatus::Success]);
    }

    #[test]
    fn tracing_sink_never_fails() {
        assert!(TracingAuditSink.record(&summary(AuditStatus::Success)).is_ok());
    }
}
