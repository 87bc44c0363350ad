//! Customer transaction data mart.
//!
//! This crate stitches the stages together so callers hand over a batch file
//! and get back a report:
//!
//! 1. [`ingest`] turns file bytes into raw records (CSV, TSV, Excel, JSON,
//!    XML, PDF).
//! 2. [`canonical`] folds keys into one predictable shape.
//! 3. [`schema`] validates each record against its domain contract and
//!    splits the batch into accepted records and a [`BatchReport`].
//! 4. [`index`] stores accepted rows per domain, rejection diagnostics in
//!    the error store, and folds accepted rows into one document per
//!    customer.
//!
//! Every batch ends with exactly one [`AuditSummary`].
//!
//! ```rust
//! use schema::Domain;
//! use txmart::{BatchInput, MartConfig, Pipeline};
//!
//! let pipeline = Pipeline::from_config(&MartConfig::default()).unwrap();
//! let csv = b"transaction_id,customer_id,amount\nT1,C1,10\nT2,,5\nT3,C2,\"1,234.50\"\n";
//! let outcome = pipeline
//!     .process_batch(&BatchInput::new("retail.csv", "csv", Domain::Retail, csv.to_vec()))
//!     .unwrap();
//! assert_eq!(outcome.report.accepted(), 2);
//! assert_eq!(outcome.aggregated.appended, 2);
//! ```

pub mod audit;
pub mod config;
pub mod telemetry;

pub use audit::{
    AuditError, AuditSink, AuditStatus, AuditSummary, DocumentAuditSink, MemoryAuditSink,
    TracingAuditSink,
};
pub use config::{ConfigLoadError, LoggingConfig, MartConfig, NamingConfig, StoreConfig};

pub use canonical::{normalize, NormalizeConfig, NormalizedRecord};
pub use index::{
    AggregateStore, AggregationSummary, CustomerAggregate, CustomerAggregator, DocumentStore,
    IndexError, WarehouseWriter, WriteSummary,
};
pub use ingest::{IngestError, ParserRegistry, RawRecord};
pub use schema::{BatchReport, Domain, SchemaError, ValidationPartitioner};

use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use index::{KvAggregateStore, KvDocumentStore};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, info_span, warn};

/// Batch-level failures. Any of these aborts the batch; the batch still gets
/// a FAILED audit summary.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("ingest failure: {0}")]
    Ingest(#[from] IngestError),

    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    #[error("validation failure: {0}")]
    Schema(SchemaError),

    #[error("store failure: {0}")]
    Store(IndexError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("batch worker failed: {0}")]
    Worker(String),
}

impl From<SchemaError> for PipelineError {
    fn from(value: SchemaError) -> Self {
        match value {
            SchemaError::UnknownDomain(domain) => PipelineError::UnknownDomain(domain),
            other => PipelineError::Schema(other),
        }
    }
}

impl From<IndexError> for PipelineError {
    fn from(value: IndexError) -> Self {
        match value {
            IndexError::UnknownStore(domain) => PipelineError::UnknownDomain(domain),
            other => PipelineError::Store(other),
        }
    }
}

impl From<ConfigLoadError> for PipelineError {
    fn from(value: ConfigLoadError) -> Self {
        PipelineError::Config(value.to_string())
    }
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_parse(&self, latency: Duration, result: Result<usize, IngestError>);
    fn record_validation(&self, latency: Duration, result: Result<(usize, usize), SchemaError>);
    fn record_store(&self, latency: Duration, result: Result<(), PipelineError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    fn record_parse(self, result: Result<usize, IngestError>) {
        self.recorder.record_parse(self.start.elapsed(), result);
    }

    fn record_validation(self, result: Result<(usize, usize), SchemaError>) {
        self.recorder.record_validation(self.start.elapsed(), result);
    }

    fn record_store(self, result: Result<(), PipelineError>) {
        self.recorder.record_store(self.start.elapsed(), result);
    }
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInput {
    /// Usually the original file name; copied into error records and the
    /// audit log.
    pub file_id: String,
    /// Format tag, e.g. `csv` or `xlsx`.
    pub format: String,
    pub domain: Domain,
    pub bytes: Vec<u8>,
}

impl BatchInput {
    pub fn new(
        file_id: impl Into<String>,
        format: impl Into<String>,
        domain: Domain,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            format: format.into(),
            domain,
            bytes,
        }
    }

    /// Format from the extension, domain from the naming convention.
    pub fn from_file_name(
        file_name: &str,
        bytes: Vec<u8>,
        naming: &NamingConfig,
    ) -> Result<Self, PipelineError> {
        let format = ingest::format_from_file_name(file_name)
            .ok_or_else(|| IngestError::UnsupportedFormat(file_name.to_string()))?;
        let domain = naming
            .detect(file_name)
            .ok_or_else(|| PipelineError::UnknownDomain(file_name.to_string()))?;
        Ok(Self::new(file_name, format, domain, bytes))
    }
}

/// Everything a successful batch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub report: BatchReport,
    pub written: WriteSummary,
    pub aggregated: AggregationSummary,
}

/// The assembled pipeline. `Send + Sync`; share it behind an `Arc` and feed
/// independent batches from as many threads as needed.
pub struct Pipeline {
    registry: ParserRegistry,
    normalize: NormalizeConfig,
    partitioner: ValidationPartitioner,
    warehouse: WarehouseWriter,
    aggregator: CustomerAggregator,
    audit: Arc<dyn AuditSink>,
    naming: NamingConfig,
}

impl Pipeline {
    /// Open the configured backend once and wire every stage to it. Audit
    /// summaries go to the audit collection.
    pub fn from_config(cfg: &MartConfig) -> Result<Self, PipelineError> {
        cfg.validate()?;
        let registry = ParserRegistry::from_config(&cfg.ingest)
            .map_err(|err| PipelineError::Config(err.to_string()))?;
        let partitioner =
            ValidationPartitioner::new(schema::ContractSet::builtin(), cfg.validation.clone())?;

        let backend = cfg.stores.backend_config().build()?;
        let compression = cfg.stores.compression_config();
        let docs: Arc<dyn DocumentStore> =
            Arc::new(KvDocumentStore::new(backend.clone(), compression.clone()));
        let warehouse = WarehouseWriter::new(docs.clone(), cfg.stores.store_names());
        let aggregates = KvAggregateStore::with_prefix(
            backend,
            compression,
            cfg.stores.aggregate_prefix.clone(),
        );
        let aggregator = CustomerAggregator::new(Arc::new(aggregates), cfg.aggregate.clone())?
            .with_fingerprint_version(cfg.normalize.version);
        let audit = Arc::new(DocumentAuditSink::new(docs, cfg.stores.audit_store.clone()));

        Ok(Self::with_components(
            registry,
            cfg.normalize.clone(),
            partitioner,
            warehouse,
            aggregator,
            audit,
        )
        .with_naming(cfg.naming.clone()))
    }

    /// Assemble from pre-built stages, e.g. with custom contracts or an
    /// in-memory audit sink.
    pub fn with_components(
        registry: ParserRegistry,
        normalize: NormalizeConfig,
        partitioner: ValidationPartitioner,
        warehouse: WarehouseWriter,
        aggregator: CustomerAggregator,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            normalize,
            partitioner,
            warehouse,
            aggregator,
            audit,
            naming: NamingConfig::default(),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_naming(mut self, naming: NamingConfig) -> Self {
        self.naming = naming;
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn warehouse(&self) -> &WarehouseWriter {
        &self.warehouse
    }

    pub fn aggregator(&self) -> &CustomerAggregator {
        &self.aggregator
    }

    /// Read side of the customer aggregate.
    pub fn aggregates(&self) -> &Arc<dyn AggregateStore> {
        self.aggregator.store()
    }

    pub fn naming(&self) -> &NamingConfig {
        &self.naming
    }

    /// [`BatchInput::from_file_name`] with this pipeline's naming convention.
    pub fn input_from_file_name(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<BatchInput, PipelineError> {
        BatchInput::from_file_name(file_name, bytes, &self.naming)
    }

    /// Parse, normalize, validate, store and aggregate one batch.
    ///
    /// Never panics on bad input. Exactly one audit summary is recorded
    /// whatever the result; a batch with rejected records is still a
    /// success.
    pub fn process_batch(&self, input: &BatchInput) -> Result<BatchOutcome, PipelineError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let span = info_span!(
            "pipeline.batch",
            file_id = %input.file_id,
            domain = %input.domain,
            format = %input.format
        );
        let _guard = span.enter();

        let result = self.run(input);

        let summary = audit_summary(input, &result, started_at);
        if let Err(err) = self.audit.record(&summary) {
            warn!(error = %err, "audit_failure");
        }

        let elapsed_micros = start.elapsed().as_micros();
        match &result {
            Ok(outcome) => info!(
                total = outcome.report.total(),
                accepted = outcome.report.accepted(),
                rejected = outcome.report.rejected(),
                appended = outcome.aggregated.appended,
                duplicates = outcome.aggregated.duplicates,
                identity_missing = outcome.aggregated.identity_missing,
                elapsed_micros,
                "batch_success"
            ),
            Err(err) => warn!(error = %err, elapsed_micros, "batch_failure"),
        }
        result
    }

    /// Process independent batches in parallel. Results come back in input
    /// order; one failing batch does not affect the others.
    pub fn process_all(&self, inputs: &[BatchInput]) -> Vec<Result<BatchOutcome, PipelineError>> {
        inputs
            .par_iter()
            .map(|input| self.process_batch(input))
            .collect()
    }

    /// [`process_batch`](Self::process_batch) on the blocking pool, for async
    /// callers.
    pub async fn process_batch_async(
        self: Arc<Self>,
        input: BatchInput,
    ) -> Result<BatchOutcome, PipelineError> {
        tokio::task::spawn_blocking(move || self.process_batch(&input))
            .await
            .map_err(|err| PipelineError::Worker(err.to_string()))?
    }

    fn run(&self, input: &BatchInput) -> Result<BatchOutcome, PipelineError> {
        let mut parse_metrics = MetricsSpan::start();
        let raw = match self.registry.parse(&input.format, &input.bytes) {
            Ok(raw) => {
                if let Some(span) = parse_metrics.take() {
                    span.record_parse(Ok(raw.len()));
                }
                raw
            }
            Err(err) => {
                if let Some(span) = parse_metrics.take() {
                    span.record_parse(Err(err.clone()));
                }
                return Err(err.into());
            }
        };

        let records: Vec<NormalizedRecord> = raw
            .into_iter()
            .map(|record| normalize(record, &self.normalize))
            .collect();

        let mut validation_metrics = MetricsSpan::start();
        let partition = match self
            .partitioner
            .partition(input.domain, &input.file_id, records)
        {
            Ok(partition) => {
                if let Some(span) = validation_metrics.take() {
                    span.record_validation(Ok((
                        partition.report.accepted(),
                        partition.report.rejected(),
                    )));
                }
                partition
            }
            Err(err) => {
                if let Some(span) = validation_metrics.take() {
                    span.record_validation(Err(err.clone()));
                }
                return Err(err.into());
            }
        };

        // Fail an unmapped domain before either store is touched.
        self.warehouse.names().domain_store(input.domain)?;

        // Aggregate first; a replay after a failed warehouse write dedupes.
        let mut store_metrics = MetricsSpan::start();
        let stored = self
            .aggregator
            .contribute(input.domain, &partition.accepted)
            .and_then(|aggregated| {
                self.warehouse
                    .write(
                        &input.file_id,
                        input.domain,
                        &partition.accepted,
                        &partition.report,
                    )
                    .map(|written| (written, aggregated))
            })
            .map_err(PipelineError::from);
        if let Some(span) = store_metrics.take() {
            span.record_store(stored.as_ref().map(|_| ()).map_err(|err| err.clone()));
        }
        let (written, aggregated) = stored?;

        Ok(BatchOutcome {
            report: partition.report,
            written,
            aggregated,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("normalize", &self.normalize)
            .field("partitioner", &self.partitioner)
            .field("warehouse", &self.warehouse)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

fn audit_summary(
    input: &BatchInput,
    result: &Result<BatchOutcome, PipelineError>,
    started_at: chrono::DateTime<Utc>,
) -> AuditSummary {
    let (status, processed_rows, accepted_rows, error_rows, comments) = match result {
        Ok(outcome) => {
            let report = &outcome.report;
            let comments = (!report.is_clean())
                .then(|| format!("{} record(s) rejected", report.rejected()));
            (
                AuditStatus::Success,
                report.total(),
                report.accepted(),
                report.rejected(),
                comments,
            )
        }
        Err(err) => (AuditStatus::Failed, 0, 0, 0, Some(err.to_string())),
    };
    AuditSummary {
        file_name: input.file_id.clone(),
        file_type: input.format.clone(),
        file_size_bytes: input.bytes.len(),
        status,
        processed_rows,
        accepted_rows,
        error_rows,
        comments,
        started_at,
        finished_at: Utc::now(),
    }
}
