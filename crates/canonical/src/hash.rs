//! Hashing utilities for normalized records.
//!
//! # Record fingerprint
//!
//! ```text
//! SHA-256(version.to_be_bytes() || 0x02 || scope || 0x00 || identity || 0x00 || canonical_json)
//! ```
//!
//! - `version`: [`NormalizeConfig::version`](crate::NormalizeConfig::version)
//! - `0x02`: discriminator for record-level fingerprints
//! - `scope`: the domain the record was accepted under
//! - `identity`: the customer identity it is folded into
//! - `canonical_json`: the record with object keys sorted at every level
//!
//! The fingerprint does not depend on field order, so the same row read from
//! a CSV and from a JSON export hashes identically.
//!
//! ```rust
//! use canonical::{hash_canonical_bytes, hash_text};
//!
//! assert_eq!(hash_text("hello world").len(), 64);
//! assert_ne!(hash_canonical_bytes(1, b"row"), hash_canonical_bytes(2, b"row"));
//! ```
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::record::NormalizedRecord;

/// SHA-256 of arbitrary text, hex-encoded. Not version-aware.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Version-aware hash of canonical bytes.
///
/// ```text
/// SHA-256(version.to_be_bytes() || 0x00 || canonical_bytes)
/// ```
pub fn hash_canonical_bytes(canonical_version: u32, canonical_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_version.to_be_bytes());
    hasher.update([0]);
    hasher.update(canonical_bytes);
    hex::encode(hasher.finalize())
}

/// Compact JSON with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        scalar => scalar.clone(),
    }
}

/// Fingerprint of one record as folded into one identity under one scope.
pub fn record_fingerprint(
    version: u32,
    scope: &str,
    identity: &str,
    record: &NormalizedRecord,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.to_be_bytes());
    hasher.update([2]);
    hasher.update(scope.as_bytes());
    hasher.update([0]);
    hasher.update(identity.as_bytes());
    hasher.update([0]);
    hasher.update(canonical_json(&record.to_value()).as_bytes());
    hex::encode(hasher.finalize())
}
