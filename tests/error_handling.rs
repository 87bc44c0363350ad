use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use index::{
    AggregatorConfig, CompressionConfig, CustomerAggregator, InMemoryBackend, IndexBackend,
    IndexError, KvAggregateStore, KvDocumentStore, StoreNames,
};
use ingest::ParserRegistry;
use schema::{ContractSet, ValidationConfig};
use txmart::{
    AuditStatus, BatchInput, DocumentStore, Domain, IngestError, MartConfig, MemoryAuditSink,
    NormalizeConfig, Pipeline, PipelineError, ValidationPartitioner, WarehouseWriter,
};

fn audited(cfg: &MartConfig) -> (Pipeline, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = Pipeline::from_config(cfg)
        .expect("pipeline")
        .with_audit_sink(audit.clone());
    (pipeline, audit)
}

#[test]
fn unsupported_format_fails_and_is_audited() {
    let (pipeline, audit) = audited(&MartConfig::default());
    let result = pipeline.process_batch(&BatchInput::new(
        "retail.docx",
        "docx",
        Domain::Retail,
        vec![0x50, 0x4b],
    ));
    assert_eq!(
        result,
        Err(PipelineError::Ingest(IngestError::UnsupportedFormat("docx".into())))
    );

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.status, AuditStatus::Failed);
    assert_eq!(entry.file_type, "docx");
    assert_eq!(entry.file_size_bytes, 2);
    assert_eq!((entry.processed_rows, entry.accepted_rows, entry.error_rows), (0, 0, 0));
}

#[test]
fn malformed_json_leaves_stores_untouched() {
    let (pipeline, audit) = audited(&MartConfig::default());
    let result = pipeline.process_batch(&BatchInput::new(
        "upi.json",
        "json",
        Domain::Upi,
        b"[{\"Customer ID\": ".to_vec(),
    ));
    assert!(matches!(
        result,
        Err(PipelineError::Ingest(IngestError::MalformedFile { format: "json", .. }))
    ));
    assert_eq!(audit.entries()[0].status, AuditStatus::Failed);
    assert!(pipeline.warehouse().domain_records(Domain::Upi).unwrap().is_empty());
    assert!(pipeline.warehouse().error_records().unwrap().is_empty());
    assert!(pipeline.aggregates().customers().unwrap().is_empty());
}

#[test]
fn json_top_level_must_be_an_array_of_objects() {
    let (pipeline, _audit) = audited(&MartConfig::default());
    let result = pipeline.process_batch(&BatchInput::new(
        "upi.json",
        "json",
        Domain::Upi,
        b"{\"customer_id\": \"C1\"}".to_vec(),
    ));
    assert!(matches!(
        result,
        Err(PipelineError::Ingest(IngestError::MalformedFile { .. }))
    ));
}

#[test]
fn oversized_files_are_refused_before_parsing() {
    let mut cfg = MartConfig::default();
    cfg.ingest.max_file_bytes = Some(16);
    let (pipeline, audit) = audited(&cfg);

    let csv = b"transaction_id,customer_id,amount\nT1,C1,10\n".to_vec();
    let size = csv.len();
    let result = pipeline.process_batch(&BatchInput::new("retail.csv", "csv", Domain::Retail, csv));
    assert_eq!(
        result,
        Err(PipelineError::Ingest(IngestError::FileTooLarge { size, limit: 16 }))
    );
    let entry = &audit.entries()[0];
    assert_eq!(entry.status, AuditStatus::Failed);
    assert!(entry
        .comments
        .as_deref()
        .is_some_and(|text| text.contains("exceeds limit of 16 bytes")));
}

#[test]
fn domain_without_a_store_fails_before_any_write() {
    let mut cfg = MartConfig::default();
    cfg.stores.domains.remove(&Domain::Trade);
    let (pipeline, audit) = audited(&cfg);

    let result = pipeline.process_batch(&BatchInput::new(
        "trade.csv",
        "csv",
        Domain::Trade,
        b"trade_id,customer_id\n1,C1\n,C2\n".to_vec(),
    ));
    assert_eq!(result, Err(PipelineError::UnknownDomain("trade".into())));
    assert_eq!(audit.entries()[0].status, AuditStatus::Failed);
    assert!(pipeline.warehouse().error_records().unwrap().is_empty());
    assert!(pipeline.aggregates().customers().unwrap().is_empty());
}

#[test]
fn domain_without_a_contract_is_unknown() {
    let backend = Arc::new(InMemoryBackend::new());
    let docs: Arc<dyn DocumentStore> = Arc::new(KvDocumentStore::new(
        backend.clone(),
        CompressionConfig::default(),
    ));
    let aggregates = KvAggregateStore::new(backend, CompressionConfig::default());
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = Pipeline::with_components(
        ParserRegistry::with_builtin(),
        NormalizeConfig::default(),
        ValidationPartitioner::new(ContractSet::empty(), ValidationConfig::default())
            .expect("partitioner"),
        WarehouseWriter::new(docs, StoreNames::default()),
        CustomerAggregator::new(Arc::new(aggregates), AggregatorConfig::default())
            .expect("aggregator"),
        audit.clone(),
    );

    let result = pipeline.process_batch(&BatchInput::new(
        "retail.csv",
        "csv",
        Domain::Retail,
        b"transaction_id,customer_id\nT1,C1\n".to_vec(),
    ));
    assert_eq!(result, Err(PipelineError::UnknownDomain("retail".into())));
    assert_eq!(audit.entries().len(), 1);
}

#[test]
fn file_names_without_a_domain_keyword_are_refused() {
    let pipeline = Pipeline::from_config(&MartConfig::default()).expect("pipeline");
    assert_eq!(
        pipeline.input_from_file_name("ledger_2024.csv", vec![]),
        Err(PipelineError::UnknownDomain("ledger_2024.csv".into()))
    );
    assert!(matches!(
        pipeline.input_from_file_name("Customer_Retail.parquet", vec![]),
        Err(PipelineError::Ingest(IngestError::UnsupportedFormat(_)))
    ));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut cfg = MartConfig::default();
    cfg.stores.aggregate_prefix = "doc".into();
    assert!(matches!(
        Pipeline::from_config(&cfg),
        Err(PipelineError::Config(_))
    ));

    let mut cfg = MartConfig::default();
    cfg.stores.level = 99;
    assert!(matches!(
        Pipeline::from_config(&cfg),
        Err(PipelineError::Config(_))
    ));
}

#[test]
fn a_bad_batch_does_not_poison_the_next_one() {
    let (pipeline, audit) = audited(&MartConfig::default());
    let _ = pipeline.process_batch(&BatchInput::new(
        "retail.xml",
        "xml",
        Domain::Retail,
        b"<rows><row>".to_vec(),
    ));
    let ok = pipeline
        .process_batch(&BatchInput::new(
            "retail.csv",
            "csv",
            Domain::Retail,
            b"transaction_id,customer_id\nT1,C1\n".to_vec(),
        ))
        .expect("second batch");
    assert_eq!(ok.report.accepted(), 1);

    let statuses: Vec<AuditStatus> = audit.entries().iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![AuditStatus::Failed, AuditStatus::Success]);
}

/// Document backend whose batches can be switched off.
struct Flaky {
    inner: InMemoryBackend,
    down: AtomicBool,
}

impl IndexBackend for Flaky {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), IndexError> {
        self.inner.put(key, value)
    }
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IndexError> {
        self.inner.get(key)
    }
    fn delete(&self, key: &str) -> Result<(), IndexError> {
        self.inner.delete(key)
    }
    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), IndexError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(IndexError::backend("warehouse unavailable"));
        }
        self.inner.batch_put(entries)
    }
    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        self.inner.scan_prefix(prefix, visitor)
    }
}

#[test]
fn replay_after_a_failed_warehouse_write_stores_each_row_once() {
    let flaky = Arc::new(Flaky {
        inner: InMemoryBackend::new(),
        down: AtomicBool::new(true),
    });
    let docs: Arc<dyn DocumentStore> =
        Arc::new(KvDocumentStore::new(flaky.clone(), CompressionConfig::default()));
    let aggregates = KvAggregateStore::new(Arc::new(InMemoryBackend::new()), CompressionConfig::default());
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = Pipeline::with_components(
        ParserRegistry::with_builtin(),
        NormalizeConfig::default(),
        ValidationPartitioner::with_defaults().expect("partitioner"),
        WarehouseWriter::new(docs, StoreNames::default()),
        CustomerAggregator::new(Arc::new(aggregates), AggregatorConfig::default())
            .expect("aggregator"),
        audit.clone(),
    );
    let input = BatchInput::new(
        "retail.csv",
        "csv",
        Domain::Retail,
        b"transaction_id,customer_id\nT1,C1\nT2,\nT3,C2\n".to_vec(),
    );

    assert!(matches!(
        pipeline.process_batch(&input),
        Err(PipelineError::Store(_))
    ));
    assert!(pipeline.warehouse().domain_records(Domain::Retail).unwrap().is_empty());
    assert!(pipeline.warehouse().error_records().unwrap().is_empty());

    flaky.down.store(false, Ordering::SeqCst);
    let replay = pipeline.process_batch(&input).expect("replay");
    assert_eq!((replay.aggregated.appended, replay.aggregated.duplicates), (0, 2));
    assert_eq!(pipeline.warehouse().domain_records(Domain::Retail).unwrap().len(), 2);
    assert_eq!(pipeline.warehouse().error_records().unwrap().len(), 1);
    assert_eq!(pipeline.aggregates().records("C1", None).unwrap().len(), 1);

    let statuses: Vec<AuditStatus> = audit.entries().iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![AuditStatus::Failed, AuditStatus::Success]);
}
