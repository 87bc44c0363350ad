use std::collections::BTreeMap;

use canonical::NormalizedRecord;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::validate::{FieldError, ValidationOutcome};

/// A rejected record with its position in the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// 1-based position in the batch.
    pub record_number: usize,
    pub record: NormalizedRecord,
    pub errors: Vec<FieldError>,
}

impl RejectedRecord {
    /// Logical names of the failing fields, deduplicated, in error order.
    pub fn invalid_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::with_capacity(self.errors.len());
        for err in &self.errors {
            if !fields.contains(&err.field) {
                fields.push(err.field.clone());
            }
        }
        fields
    }
}

/// Outcome of one batch. Built once by the partitioner; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    file_id: String,
    domain: Domain,
    total: usize,
    accepted: usize,
    rejected: usize,
    rejections: Vec<RejectedRecord>,
}

impl BatchReport {
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Rejected records in batch order.
    pub fn rejections(&self) -> &[RejectedRecord] {
        &self.rejections
    }

    pub fn is_clean(&self) -> bool {
        self.rejected == 0
    }

    /// How often each logical field failed across the batch.
    pub fn failures_by_field(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for rejection in &self.rejections {
            for field in rejection.invalid_fields() {
                *counts.entry(field).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// A validated batch: the report plus the accepted records in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub report: BatchReport,
    pub accepted: Vec<NormalizedRecord>,
}

impl Partition {
    /// Splits outcomes (in batch order) into accepted records and the report.
    pub fn from_outcomes(file_id: &str, domain: Domain, outcomes: Vec<ValidationOutcome>) -> Self {
        let total = outcomes.len();
        let mut accepted = Vec::with_capacity(total);
        let mut rejections = Vec::new();
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                ValidationOutcome::Accepted(record) => accepted.push(record),
                ValidationOutcome::Rejected { record, errors } => rejections.push(RejectedRecord {
                    record_number: idx + 1,
                    record,
                    errors,
                }),
            }
        }
        let report = BatchReport {
            file_id: file_id.to_string(),
            domain,
            total,
            accepted: accepted.len(),
            rejected: rejections.len(),
            rejections,
        };
        Self { report, accepted }
    }
}
