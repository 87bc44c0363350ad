use std::sync::Arc;
use std::time::Instant;

use canonical::NormalizedRecord;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::ContractSet;
use crate::domain::Domain;
use crate::error::SchemaError;
use crate::report::Partition;
use crate::validate::{validate, ValidationOutcome};

/// Worker pool sizing for record validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Threads in the dedicated validation pool.
    ///
    /// Default: available parallelism, or 4 when unknown.
    pub max_workers: usize,

    /// Batches smaller than this are validated on the calling thread.
    ///
    /// Default: `256`
    pub parallel_threshold: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            parallel_threshold: 256,
        }
    }
}

impl ValidationConfig {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.max_workers == 0 {
            return Err(SchemaError::InvalidConfig(
                "max_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Validates whole batches and splits them into accepted records and a
/// report.
///
/// Every record is validated exactly once; a rejection never stops the
/// batch. Accepted records come back in input order whether or not the
/// batch ran on the pool.
pub struct ValidationPartitioner {
    contracts: Arc<ContractSet>,
    pool: ThreadPool,
    cfg: ValidationConfig,
}

impl ValidationPartitioner {
    pub fn new(contracts: ContractSet, cfg: ValidationConfig) -> Result<Self, SchemaError> {
        cfg.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(cfg.max_workers)
            .thread_name(|idx| format!("mart-validate-{idx}"))
            .build()
            .map_err(|err| SchemaError::WorkerPool(err.to_string()))?;
        Ok(Self {
            contracts: Arc::new(contracts),
            pool,
            cfg,
        })
    }

    /// Built-in contracts, default pool.
    pub fn with_defaults() -> Result<Self, SchemaError> {
        Self::new(ContractSet::builtin(), ValidationConfig::default())
    }

    pub fn contracts(&self) -> &ContractSet {
        &self.contracts
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.cfg
    }

    /// Validates `records` against the contract of `domain`.
    ///
    /// Fails only when the domain has no contract; that aborts this batch
    /// and nothing else.
    pub fn partition(
        &self,
        domain: Domain,
        file_id: &str,
        records: Vec<NormalizedRecord>,
    ) -> Result<Partition, SchemaError> {
        let start = Instant::now();
        let contract = self.contracts.get(domain)?;
        let parallel = records.len() >= self.cfg.parallel_threshold && self.cfg.max_workers > 1;

        let outcomes: Vec<ValidationOutcome> = if parallel {
            debug!(records = records.len(), workers = self.cfg.max_workers, "partition_parallel");
            self.pool
                .install(|| records.par_iter().map(|r| validate(contract, r)).collect())
        } else {
            records.iter().map(|r| validate(contract, r)).collect()
        };

        let partition = Partition::from_outcomes(file_id, domain, outcomes);
        let elapsed_micros = start.elapsed().as_micros();
        info!(
            file_id,
            domain = %domain,
            total = partition.report.total(),
            accepted = partition.report.accepted(),
            rejected = partition.report.rejected(),
            parallel,
            elapsed_micros,
            "partition_complete"
        );
        Ok(partition)
    }
}

impl std::fmt::Debug for ValidationPartitioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPartitioner")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}
