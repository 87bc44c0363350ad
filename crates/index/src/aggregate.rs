//! Customer-centric aggregate.
//!
//! One document per customer identity, one append-only bucket per domain.
//! Writes for one identity are serialised by a per-identity mutex; different
//! identities never contend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use canonical::{record_fingerprint, NormalizedRecord};
use dashmap::DashMap;
use schema::Domain;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::compression::CompressionConfig;
use crate::{IndexBackend, IndexError};

/// Everything known about one customer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerAggregate {
    pub customer_id: String,
    pub collections: BTreeMap<Domain, Vec<Value>>,
    /// Fingerprints of records already folded in.
    #[serde(default)]
    pub fingerprints: BTreeSet<String>,
}

impl CustomerAggregate {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            ..Self::default()
        }
    }

    /// One domain bucket; empty when the customer has none.
    pub fn bucket(&self, domain: Domain) -> &[Value] {
        self.collections
            .get(&domain)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn total_records(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

/// Result of one [`AggregateStore::upsert_append`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The fingerprint was already present; nothing was written.
    Duplicate,
}

/// Storage for [`CustomerAggregate`] documents.
pub trait AggregateStore: Send + Sync {
    /// Append `record` to the `domain` bucket of `identity`, creating the
    /// customer on first contact.
    ///
    /// Atomic per identity. With a fingerprint, the duplicate check happens
    /// inside the same critical section as the append.
    fn upsert_append(
        &self,
        identity: &str,
        domain: Domain,
        record: Value,
        fingerprint: Option<&str>,
    ) -> Result<AppendOutcome, IndexError>;

    fn get(&self, identity: &str) -> Result<Option<CustomerAggregate>, IndexError>;

    /// Records of one customer, optionally restricted to one domain.
    /// Unknown customers have no records.
    fn records(&self, identity: &str, domain: Option<Domain>) -> Result<Vec<Value>, IndexError> {
        let Some(aggregate) = self.get(identity)? else {
            return Ok(Vec::new());
        };
        Ok(match domain {
            Some(domain) => aggregate.bucket(domain).to_vec(),
            None => aggregate.collections.into_values().flatten().collect(),
        })
    }

    /// Every known customer identity, sorted.
    fn customers(&self) -> Result<Vec<String>, IndexError>;
}

/// [`AggregateStore`] over an [`IndexBackend`], one key per customer.
pub struct KvAggregateStore {
    backend: Arc<dyn IndexBackend>,
    compression: CompressionConfig,
    prefix: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KvAggregateStore {
    pub fn new(backend: Arc<dyn IndexBackend>, compression: CompressionConfig) -> Self {
        Self::with_prefix(backend, compression, "agg")
    }

    pub fn with_prefix(
        backend: Arc<dyn IndexBackend>,
        compression: CompressionConfig,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            compression,
            prefix: format!("{}/", prefix.into()),
            locks: DashMap::new(),
        }
    }

    fn key(&self, identity: &str) -> String {
        format!("{}{identity}", self.prefix)
    }

    fn append_locked(
        &self,
        identity: &str,
        domain: Domain,
        record: Value,
        fingerprint: Option<&str>,
    ) -> Result<AppendOutcome, IndexError> {
        let key = self.key(identity);
        let mut aggregate = self
            .load(&key)?
            .unwrap_or_else(|| CustomerAggregate::new(identity));

        if let Some(fingerprint) = fingerprint {
            if !aggregate.fingerprints.insert(fingerprint.to_string()) {
                return Ok(AppendOutcome::Duplicate);
            }
        }
        aggregate.collections.entry(domain).or_default().push(record);

        self.backend
            .put(&key, &self.compression.encode_json(&aggregate)?)?;
        Ok(AppendOutcome::Appended)
    }

    fn load(&self, key: &str) -> Result<Option<CustomerAggregate>, IndexError> {
        self.backend
            .get(key)?
            .map(|data| self.compression.decode_json(&data))
            .transpose()
    }
}

impl std::fmt::Debug for KvAggregateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvAggregateStore")
            .field("prefix", &self.prefix)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

impl AggregateStore for KvAggregateStore {
    fn upsert_append(
        &self,
        identity: &str,
        domain: Domain,
        record: Value,
        fingerprint: Option<&str>,
    ) -> Result<AppendOutcome, IndexError> {
        // Clone the Arc out so the DashMap shard is released before blocking.
        let lock = self.locks.entry(identity.to_string()).or_default().clone();
        let outcome = {
            let _guard = lock
                .lock()
                .map_err(|_| IndexError::backend("poisoned aggregate lock"))?;
            self.append_locked(identity, domain, record, fingerprint)
        };
        // Forget the lock once no other writer holds or waits on it.
        self.locks
            .remove_if(identity, |_, held| Arc::strong_count(held) == 2);
        outcome
    }

    fn get(&self, identity: &str) -> Result<Option<CustomerAggregate>, IndexError> {
        self.load(&self.key(identity))
    }

    fn customers(&self) -> Result<Vec<String>, IndexError> {
        let mut ids = Vec::new();
        self.backend.scan_prefix(&self.prefix, &mut |_, data| {
            let aggregate: CustomerAggregate = self.compression.decode_json(data)?;
            ids.push(aggregate.customer_id);
            Ok(())
        })?;
        ids.sort();
        Ok(ids)
    }
}

/// Aggregation behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Skip records whose fingerprint the customer already holds.
    ///
    /// Default: `true`
    pub dedupe: bool,

    /// Remove the identity key from the stored copy.
    ///
    /// Default: `false`
    pub strip_identity: bool,

    /// Keys tried in order for the customer identity, matched
    /// case-insensitively. The first non-empty one wins.
    pub identity_fields: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            dedupe: true,
            strip_identity: false,
            identity_fields: ["customer_id", "cust_id", "customerid", "customer id"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.identity_fields.iter().all(|f| f.trim().is_empty()) {
            return Err(IndexError::backend(
                "aggregate.identity_fields must name at least one key",
            ));
        }
        Ok(())
    }
}

/// Counts from one [`CustomerAggregator::contribute`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSummary {
    pub appended: usize,
    pub duplicates: usize,
    pub identity_missing: usize,
}

/// Folds accepted records into the customer aggregate.
#[derive(Clone)]
pub struct CustomerAggregator {
    store: Arc<dyn AggregateStore>,
    cfg: AggregatorConfig,
    fingerprint_version: u32,
}

impl CustomerAggregator {
    pub fn new(store: Arc<dyn AggregateStore>, cfg: AggregatorConfig) -> Result<Self, IndexError> {
        cfg.validate()?;
        Ok(Self {
            store,
            cfg,
            fingerprint_version: 1,
        })
    }

    /// Version mixed into record fingerprints. Bumping it makes every
    /// previously seen record look new.
    pub fn with_fingerprint_version(mut self, version: u32) -> Self {
        self.fingerprint_version = version;
        self
    }

    pub fn store(&self) -> &Arc<dyn AggregateStore> {
        &self.store
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.cfg
    }

    /// Appends every record with a resolvable identity to that customer's
    /// `domain` bucket, in input order.
    ///
    /// Records without an identity are skipped and counted; a storage
    /// failure stops the call.
    pub fn contribute(
        &self,
        domain: Domain,
        records: &[NormalizedRecord],
    ) -> Result<AggregationSummary, IndexError> {
        let mut summary = AggregationSummary::default();
        for (idx, record) in records.iter().enumerate() {
            let Some((key, identity)) = self.resolve_identity(record) else {
                warn!(domain = %domain, record_index = idx, "record_identity_missing");
                summary.identity_missing += 1;
                continue;
            };

            let mut stored = record.clone();
            if self.cfg.strip_identity {
                stored.remove(&key);
            }
            let fingerprint = self.cfg.dedupe.then(|| {
                record_fingerprint(self.fingerprint_version, domain.as_str(), &identity, &stored)
            });

            match self.store.upsert_append(
                &identity,
                domain,
                stored.into_value(),
                fingerprint.as_deref(),
            )? {
                AppendOutcome::Appended => summary.appended += 1,
                AppendOutcome::Duplicate => summary.duplicates += 1,
            }
        }
        debug!(
            domain = %domain,
            appended = summary.appended,
            duplicates = summary.duplicates,
            identity_missing = summary.identity_missing,
            "aggregate_contribute"
        );
        Ok(summary)
    }

    /// The record key holding the identity and its string form.
    fn resolve_identity(&self, record: &NormalizedRecord) -> Option<(String, String)> {
        for wanted in &self.cfg.identity_fields {
            let found = record
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted.trim()));
            if let Some((key, value)) = found {
                if let Some(identity) = identity_text(value) {
                    return Some((key.clone(), identity));
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for CustomerAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerAggregator")
            .field("cfg", &self.cfg)
            .field("fingerprint_version", &self.fingerprint_version)
            .finish_non_exhaustive()
    }
}

/// Integral numbers render without a fraction so `7`, `7.0` and `"7"` are
/// the same customer.
fn identity_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some((f as i64).to_string())
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackend;
    use canonical::{normalize, NormalizeConfig};
    use ingest::RawRecord;
    use serde_json::json;

    fn record(value: Value) -> NormalizedRecord {
        normalize(
            RawRecord::from_value(value).expect("object"),
            &NormalizeConfig::default(),
        )
    }

    fn aggregator(cfg: AggregatorConfig) -> CustomerAggregator {
        let store = KvAggregateStore::new(Arc::new(InMemoryBackend::new()), CompressionConfig::default());
        CustomerAggregator::new(Arc::new(store), cfg).expect("aggregator")
    }

    #[test]
    fn groups_by_customer_across_batches_and_domains() {
        let agg = aggregator(AggregatorConfig::default());
        agg.contribute(
            Domain::Retail,
            &[
                record(json!({"customer_id": "C1", "amount": 10.0})),
                record(json!({"customer_id": "C2", "amount": 4.0})),
            ],
        )
        .unwrap();
        agg.contribute(Domain::Upi, &[record(json!({"customer_id": "C1", "amount": 3.0}))])
            .unwrap();

        let store = agg.store();
        let c1 = store.get("C1").unwrap().expect("C1 exists");
        assert_eq!(c1.bucket(Domain::Retail).len(), 1);
        assert_eq!(c1.bucket(Domain::Upi).len(), 1);
        assert_eq!(c1.total_records(), 2);
        assert_eq!(store.records("C1", Some(Domain::Upi)).unwrap()[0]["amount"], json!(3.0));
        assert_eq!(store.records("C2", None).unwrap().len(), 1);
        assert_eq!(store.customers().unwrap(), vec!["C1", "C2"]);
        assert!(store.records("nobody", None).unwrap().is_empty());
    }

    #[test]
    fn re_ingest_is_deduplicated() {
        let agg = aggregator(AggregatorConfig::default());
        let batch = [record(json!({"customer_id": "C1", "amount": 10.0}))];
        assert_eq!(agg.contribute(Domain::Retail, &batch).unwrap().appended, 1);
        let second = agg.contribute(Domain::Retail, &batch).unwrap();
        assert_eq!((second.appended, second.duplicates), (0, 1));
        assert_eq!(agg.store().records("C1", None).unwrap().len(), 1);
    }

    #[test]
    fn without_dedupe_every_contribution_appends() {
        let agg = aggregator(AggregatorConfig {
            dedupe: false,
            ..AggregatorConfig::default()
        });
        let batch = [record(json!({"customer_id": "C1"}))];
        agg.contribute(Domain::Trade, &batch).unwrap();
        agg.contribute(Domain::Trade, &batch).unwrap();
        assert_eq!(agg.store().records("C1", Some(Domain::Trade)).unwrap().len(), 2);
    }

    #[test]
    fn same_row_in_another_domain_is_not_a_duplicate() {
        let agg = aggregator(AggregatorConfig::default());
        let batch = [record(json!({"customer_id": "C1", "amount": 1.0}))];
        agg.contribute(Domain::Retail, &batch).unwrap();
        let summary = agg.contribute(Domain::Upi, &batch).unwrap();
        assert_eq!(summary.appended, 1);
    }

    #[test]
    fn missing_identity_is_counted_not_fatal() {
        let agg = aggregator(AggregatorConfig::default());
        let summary = agg
            .contribute(
                Domain::Retail,
                &[
                    record(json!({"amount": 1.0})),
                    record(json!({"customer_id": "  "})),
                    record(json!({"customer_id": "C9"})),
                ],
            )
            .unwrap();
        assert_eq!(
            summary,
            AggregationSummary {
                appended: 1,
                duplicates: 0,
                identity_missing: 2,
            }
        );
    }

    #[test]
    fn alias_keys_and_numeric_identities() {
        let agg = aggregator(AggregatorConfig::default());
        agg.contribute(Domain::CreditCard, &[record(json!({"Cust_ID": 42.0}))])
            .unwrap();
        agg.contribute(Domain::CustomerProfile, &[record(json!({"Customer ID": "42"}))])
            .unwrap();
        let customer = agg.store().get("42").unwrap().expect("42 exists");
        assert_eq!(customer.customer_id, "42");
        assert_eq!(customer.total_records(), 2);
    }

    #[test]
    fn strip_identity_removes_key_from_stored_copy() {
        let agg = aggregator(AggregatorConfig {
            strip_identity: true,
            ..AggregatorConfig::default()
        });
        agg.contribute(Domain::Upi, &[record(json!({"customer_id": "C1", "amount": 2.0}))])
            .unwrap();
        let stored = agg.store().records("C1", Some(Domain::Upi)).unwrap();
        assert_eq!(stored, vec![json!({"amount": 2.0})]);
    }

    #[test]
    fn concurrent_appends_to_one_customer_lose_nothing() {
        let agg = aggregator(AggregatorConfig::default());
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let agg = &agg;
                scope.spawn(move || {
                    for n in 0..25 {
                        let row = record(json!({"customer_id": "HOT", "worker": worker, "n": n}));
                        agg.contribute(Domain::Retail, &[row]).expect("contribute");
                    }
                });
            }
        });
        let customer = agg.store().get("HOT").unwrap().expect("HOT exists");
        assert_eq!(customer.bucket(Domain::Retail).len(), 200);
        assert_eq!(customer.fingerprints.len(), 200);
    }

    #[test]
    fn identity_locks_are_released_after_writes() {
        let store = KvAggregateStore::new(Arc::new(InMemoryBackend::new()), CompressionConfig::default());
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for n in 0..50 {
                        let identity = format!("C{}", n % 5);
                        store
                            .upsert_append(&identity, Domain::Upi, json!({"w": worker, "n": n}), None)
                            .expect("append");
                    }
                });
            }
        });
        assert_eq!(store.locks.len(), 0);
        assert_eq!(store.records("C0", None).unwrap().len(), 40);
    }

    #[test]
    fn empty_identity_list_rejected() {
        let cfg = AggregatorConfig {
            identity_fields: vec![" ".into()],
            ..AggregatorConfig::default()
        };
        let store = KvAggregateStore::new(Arc::new(InMemoryBackend::new()), CompressionConfig::none());
        assert!(CustomerAggregator::new(Arc::new(store), cfg).is_err());
    }
}
