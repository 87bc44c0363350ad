//! Mart canonical record layer.
//!
//! Parsers hand over rows with whatever key spelling the source file used.
//! This crate folds them into one predictable shape before validation.
//!
//! ## What we do
//!
//! - Lowercase every key, recursing into nested objects and arrays
//! - Drop store-internal identifier keys (`_id` by default) at every level
//! - Fingerprint records so the aggregate can recognise a re-ingested row
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock calls, no locale dependence. Same record and config in,
//! same normalized record out. Normalizing twice changes nothing.
//!
//! No validation and no type coercion happen here; values pass through
//! untouched.

mod config;
mod error;
mod hash;
mod normalize;
mod record;

pub use crate::config::NormalizeConfig;
pub use crate::error::CanonicalError;
pub use crate::hash::{canonical_json, hash_canonical_bytes, hash_text, record_fingerprint};
pub use crate::normalize::{normalize, normalize_value};
pub use crate::record::NormalizedRecord;
