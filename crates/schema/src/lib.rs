//! Mart schema layer.
//!
//! Each [`Domain`] owns one [`FieldContract`]: which fields it knows, the
//! keys they may arrive under, their target types and whether they are
//! required. [`validate`] checks one normalized record against a contract,
//! coercing loosely typed values (money with separators, dates in several
//! layouts, counts written as text) and collecting structured
//! [`FieldError`]s. [`ValidationPartitioner`] runs a whole batch and splits
//! it into accepted records and a [`BatchReport`].
//!
//! ## Rules worth knowing
//!
//! - Unknown fields are ignored and carried through untouched.
//! - Validation never short-circuits: every field of every record is checked.
//! - Retail and trade dates are lenient (bad date ⇒ null); the UPI timestamp
//!   is strict (bad timestamp ⇒ `unparseable_date`).
//! - No clock, no randomness: the same record always validates the same way.
//!
//! ```rust
//! use canonical::{normalize, NormalizeConfig};
//! use ingest::ParserRegistry;
//! use schema::{Domain, ValidationPartitioner};
//!
//! let rows = ParserRegistry::with_builtin()
//!     .parse("csv", b"transaction_id,customer_id,amount\nT1,C1,10\nT2,,5\n")
//!     .unwrap();
//! let records = rows
//!     .into_iter()
//!     .map(|r| normalize(r, &NormalizeConfig::default()))
//!     .collect();
//!
//! let partition = ValidationPartitioner::with_defaults()
//!     .unwrap()
//!     .partition(Domain::Retail, "retail.csv", records)
//!     .unwrap();
//! assert_eq!(partition.report.accepted(), 1);
//! assert_eq!(partition.report.rejections()[0].record_number, 2);
//! ```

mod coerce;
mod contract;
mod domain;
mod error;
mod partition;
mod report;
mod validate;

pub use crate::coerce::{
    coerce, coerce_email, coerce_float, coerce_identifier, coerce_integer, coerce_text, is_blank,
    is_email, parse_date, parse_time, parse_timestamp, strip_numeric, CoerceError,
    DATE_LAYOUTS, DATE_TIME_LAYOUTS, TIMESTAMP_LAYOUTS, TIME_LAYOUTS,
};
pub use crate::contract::{ContractSet, DatePolicy, FieldContract, FieldKind, FieldSpec};
pub use crate::domain::Domain;
pub use crate::error::SchemaError;
pub use crate::partition::{ValidationConfig, ValidationPartitioner};
pub use crate::report::{BatchReport, Partition, RejectedRecord};
pub use crate::validate::{validate, ErrorReason, FieldError, ValidationOutcome};
