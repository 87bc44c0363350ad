use std::collections::BTreeMap;
use std::sync::Arc;

use canonical::NormalizedRecord;
use schema::{BatchReport, Domain, FieldError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::document::DocumentStore;
use crate::IndexError;

/// Collection names for every domain plus the shared error and audit stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreNames {
    pub domains: BTreeMap<Domain, String>,
    pub error_store: String,
    pub audit_store: String,
}

impl Default for StoreNames {
    fn default() -> Self {
        let domains = [
            (Domain::CreditCard, "Customer_Credit_Card_Transactions"),
            (Domain::Retail, "Customer_Retails_Transactions"),
            (Domain::Trade, "Customer_Trade"),
            (Domain::Upi, "Customer_UPI_Transactions"),
            (Domain::CustomerProfile, "Customer"),
        ]
        .into_iter()
        .map(|(domain, name)| (domain, name.to_string()))
        .collect();
        Self {
            domains,
            error_store: "Error_Records".into(),
            audit_store: "Audit".into(),
        }
    }
}

impl StoreNames {
    /// Warehouse collection for `domain`.
    pub fn domain_store(&self, domain: Domain) -> Result<&str, IndexError> {
        self.domains
            .get(&domain)
            .map(String::as_str)
            .ok_or_else(|| IndexError::UnknownStore(domain.to_string()))
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        let names = self
            .domains
            .values()
            .chain([&self.error_store, &self.audit_store]);
        for name in names {
            if name.trim().is_empty() || name.contains('/') {
                return Err(IndexError::backend(format!(
                    "invalid collection name '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// One rejected record as stored in the error collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub filename: String,
    pub record_number: usize,
    pub record: Value,
    pub invalid_fields: Vec<String>,
    pub errors: Vec<FieldError>,
}

/// What one [`WarehouseWriter::write`] call stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub store: String,
    pub inserted: usize,
    pub error_records: usize,
}

/// Persists accepted records into their domain collection and rejection
/// diagnostics into the shared error collection.
#[derive(Clone)]
pub struct WarehouseWriter {
    docs: Arc<dyn DocumentStore>,
    names: StoreNames,
}

impl WarehouseWriter {
    pub fn new(docs: Arc<dyn DocumentStore>, names: StoreNames) -> Self {
        Self { docs, names }
    }

    pub fn names(&self) -> &StoreNames {
        &self.names
    }

    /// Writes one validated batch.
    ///
    /// The domain store is resolved before anything is written, so an
    /// unmapped domain leaves both collections untouched. Accepted rows and
    /// diagnostics go out in one grouped insert. Empty inserts are skipped.
    pub fn write(
        &self,
        file_id: &str,
        domain: Domain,
        accepted: &[NormalizedRecord],
        report: &BatchReport,
    ) -> Result<WriteSummary, IndexError> {
        let store = self.names.domain_store(domain)?;

        let rows: Vec<Value> = accepted.iter().map(NormalizedRecord::to_value).collect();
        let diagnostics = report
            .rejections()
            .iter()
            .map(|rejected| {
                let doc = ErrorRecord {
                    filename: file_id.to_string(),
                    record_number: rejected.record_number,
                    record: rejected.record.to_value(),
                    invalid_fields: rejected.invalid_fields(),
                    errors: rejected.errors.clone(),
                };
                serde_json::to_value(doc).map_err(|e| IndexError::Encode(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let counts = self.docs.insert_grouped(&[
            (store, rows.as_slice()),
            (self.names.error_store.as_str(), diagnostics.as_slice()),
        ])?;
        let [inserted, error_records] = counts[..] else {
            return Err(IndexError::backend("grouped insert returned unexpected counts"));
        };

        debug!(file_id, store, inserted, error_records, "warehouse_write");
        Ok(WriteSummary {
            store: store.to_string(),
            inserted,
            error_records,
        })
    }

    /// Everything in the error collection, oldest first.
    pub fn error_records(&self) -> Result<Vec<ErrorRecord>, IndexError> {
        self.docs
            .find_all(&self.names.error_store)?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(|e| IndexError::Decode(e.to_string())))
            .collect()
    }

    /// Everything stored for `domain`, oldest first.
    pub fn domain_records(&self, domain: Domain) -> Result<Vec<Value>, IndexError> {
        self.docs.find_all(self.names.domain_store(domain)?)
    }
}

impl std::fmt::Debug for WarehouseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseWriter")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}
