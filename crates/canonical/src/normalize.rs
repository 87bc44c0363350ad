use ingest::RawRecord;
use serde_json::{Map, Value};

use crate::config::NormalizeConfig;
use crate::record::NormalizedRecord;

/// Folds a raw record into its normalized form.
///
/// Every key is lowercased and internal identifier keys are dropped, in the
/// top-level map and inside nested objects and arrays alike. Values are not
/// touched otherwise. When two source keys fold to the same spelling, the
/// later value wins and the first position is kept.
///
/// ```rust
/// use canonical::{normalize, NormalizeConfig};
/// use ingest::RawRecord;
/// use serde_json::json;
///
/// let raw = RawRecord::from_value(json!({
///     "_id": "66f1",
///     "Customer_ID": 7,
///     "Meta": {"Channel": "APP", "_id": 1}
/// }))
/// .unwrap();
///
/// let record = normalize(raw, &NormalizeConfig::default());
/// assert_eq!(record.to_value(), json!({"customer_id": 7, "meta": {"channel": "APP"}}));
/// ```
pub fn normalize(raw: RawRecord, cfg: &NormalizeConfig) -> NormalizedRecord {
    NormalizedRecord::from_folded(fold_map(raw.into_fields(), cfg))
}

/// Applies the same folding rule to an arbitrary JSON value.
pub fn normalize_value(value: &Value, cfg: &NormalizeConfig) -> Value {
    fold_value(value.clone(), cfg)
}

fn fold_value(value: Value, cfg: &NormalizeConfig) -> Value {
    match value {
        Value::Object(map) => Value::Object(fold_map(map, cfg)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| fold_value(v, cfg)).collect()),
        scalar => scalar,
    }
}

fn fold_map(map: Map<String, Value>, cfg: &NormalizeConfig) -> Map<String, Value> {
    let mut folded = Map::with_capacity(map.len());
    for (key, value) in map {
        let key = key.to_lowercase();
        if cfg.is_internal(&key) {
            continue;
        }
        folded.insert(key, fold_value(value, cfg));
    }
    folded
}
