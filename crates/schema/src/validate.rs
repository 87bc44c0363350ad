use std::fmt;

use canonical::NormalizedRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::{coerce, is_blank};
use crate::contract::{FieldContract, FieldSpec};

/// Category of a field-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    MissingRequired,
    TypeMismatch,
    UnparseableDate,
    UnparseableNumber,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::MissingRequired => "missing_required",
            ErrorReason::TypeMismatch => "type_mismatch",
            ErrorReason::UnparseableDate => "unparseable_date",
            ErrorReason::UnparseableNumber => "unparseable_number",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Logical field name from the contract.
    pub field: String,
    /// Record key the value was read from; absent for missing fields.
    pub source_key: Option<String>,
    pub reason: ErrorReason,
    pub message: String,
}

impl FieldError {
    fn missing(spec: &FieldSpec, source_key: Option<String>) -> Self {
        Self {
            field: spec.name.clone(),
            source_key,
            reason: ErrorReason::MissingRequired,
            message: format!(
                "required field '{}' is missing (looked for {})",
                spec.name,
                spec.aliases.join(", ")
            ),
        }
    }
}

/// Result of validating one record.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Values coerced in place, under the key each was read from.
    Accepted(NormalizedRecord),
    /// The record as it was before validation, with at least one error.
    Rejected {
        record: NormalizedRecord,
        errors: Vec<FieldError>,
    },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    pub fn record(&self) -> &NormalizedRecord {
        match self {
            ValidationOutcome::Accepted(record) | ValidationOutcome::Rejected { record, .. } => {
                record
            }
        }
    }

    pub fn errors(&self) -> &[FieldError] {
        match self {
            ValidationOutcome::Accepted(_) => &[],
            ValidationOutcome::Rejected { errors, .. } => errors,
        }
    }
}

/// Validates one record against a contract.
///
/// Every field of the contract is checked; validation never stops at the
/// first error. Keys the contract does not mention are left alone.
///
/// ```rust
/// use canonical::{normalize, NormalizeConfig};
/// use ingest::RawRecord;
/// use schema::{validate, Domain, ErrorReason, FieldContract};
/// use serde_json::json;
///
/// let contract = FieldContract::builtin(Domain::Retail);
/// let raw = RawRecord::from_value(json!({"Transaction_ID": "T1", "Amount": "1,234.50"})).unwrap();
/// let outcome = validate(&contract, &normalize(raw, &NormalizeConfig::default()));
///
/// assert!(!outcome.is_accepted());
/// assert_eq!(outcome.errors()[0].field, "customer_id");
/// assert_eq!(outcome.errors()[0].reason, ErrorReason::MissingRequired);
/// ```
pub fn validate(contract: &FieldContract, record: &NormalizedRecord) -> ValidationOutcome {
    let mut coerced = record.clone();
    let mut errors = Vec::new();

    for spec in contract.fields() {
        let Some((key, value)) = resolve_alias(spec, record) else {
            if spec.required {
                errors.push(FieldError::missing(spec, None));
            }
            continue;
        };
        match coerce(spec.kind, value) {
            Ok(Value::Null) if spec.required => {
                errors.push(FieldError::missing(spec, Some(key)));
            }
            Ok(value) => {
                coerced.insert(key, value);
            }
            Err(err) => errors.push(FieldError {
                field: spec.name.clone(),
                source_key: Some(key),
                reason: err.reason,
                message: err.message,
            }),
        }
    }

    if errors.is_empty() {
        ValidationOutcome::Accepted(coerced)
    } else {
        ValidationOutcome::Rejected {
            record: record.clone(),
            errors,
        }
    }
}

/// First alias with a non-blank value; failing that, the first alias present
/// at all (its blank value then coerces to null).
fn resolve_alias<'r>(spec: &FieldSpec, record: &'r NormalizedRecord) -> Option<(String, &'r Value)> {
    let mut blank = None;
    for alias in &spec.aliases {
        if let Some(value) = record.get(alias) {
            if !is_blank(value) {
                return Some((alias.clone(), value));
            }
            blank.get_or_insert((alias.clone(), value));
        }
    }
    blank
}
