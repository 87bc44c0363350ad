//! Record types emitted by parsers.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map carried by every record. Insertion order is the source column order.
pub type Fields = Map<String, Value>;

/// One row as produced by a parser: source column name to cell value.
///
/// Keys keep the casing of the source file. Values are JSON scalars or, for
/// JSON input, arbitrarily nested objects and arrays. Empty cells are
/// [`Value::Null`].
///
/// ```rust
/// use ingest::RawRecord;
/// use serde_json::json;
///
/// let mut record = RawRecord::new();
/// record.insert("Customer_ID", json!("C1"));
/// assert_eq!(record.get("Customer_ID"), Some(&json!("C1")));
/// assert_eq!(record.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: Fields,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    /// Builds a record from a JSON object; any other value yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Inserts a field. A repeated key replaces the earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
