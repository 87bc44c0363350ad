use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record after key folding: every key is lowercase and no internal
/// identifier key remains, at any nesting level.
///
/// Built by [`normalize`](crate::normalize). Validation writes coerced values
/// back through [`NormalizedRecord::insert`], so keys stay folded as long as
/// callers insert folded keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: Map<String, Value>,
}

impl NormalizedRecord {
    pub(crate) fn from_folded(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Replaces or adds a value. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The record as a JSON object, ready for a document store.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<NormalizedRecord> for Value {
    fn from(record: NormalizedRecord) -> Self {
        record.into_value()
    }
}
