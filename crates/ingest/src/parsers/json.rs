//! JSON arrays of objects.
use serde_json::Value;

use super::Parser;
use crate::error::IngestError;
use crate::types::RawRecord;

/// Expects the top level to be an array whose elements are all objects.
/// Nested values pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn id(&self) -> &'static str {
        "json"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|err| IngestError::malformed(self.id(), err))?;
        let Value::Array(items) = value else {
            return Err(IngestError::malformed(
                self.id(),
                format!("top-level value is {}, expected an array", kind(&value)),
            ));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(fields) => Ok(RawRecord::from_fields(fields)),
                other => Err(IngestError::malformed(
                    self.id(),
                    format!("element {idx} is {}, expected an object", kind(&other)),
                )),
            })
            .collect()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
