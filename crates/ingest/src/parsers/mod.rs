//! Built-in parsers, one per file family.
//!
//! Each parser turns the complete bytes of one batch file into rows. Rows
//! keep source column names verbatim; key folding happens later, during
//! normalization.
use serde_json::{Number, Value};

use crate::error::IngestError;
use crate::types::RawRecord;

mod csv;
mod excel;
mod json;
mod pdf;
mod xml;

pub use self::csv::CsvParser;
pub use self::excel::{excel_serial_to_text, ExcelParser};
pub use self::json::JsonParser;
pub use self::pdf::{
    EmbeddedTextRecognizer, PdfPage, PdfParser, TextRecognizer, TRADE_HEADERS, TRADE_LINE_PATTERN,
};
pub use self::xml::XmlParser;

/// Decodes one batch file into rows.
///
/// Implementations are stateless with respect to the batch: the same bytes
/// always yield the same rows in the same order.
pub trait Parser: Send + Sync {
    /// Short id used in logs and error messages.
    fn id(&self) -> &'static str;

    /// Decodes the full file. Any decode failure fails the whole file.
    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError>;
}

/// A trimmed text cell, or null when nothing is left.
pub(crate) fn text_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Value::Null
    } else {
        Value::String(trimmed.to_string())
    }
}

/// Float cell that collapses integral values to JSON integers.
pub(crate) fn float_cell(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        return Value::from(value as i64);
    }
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Zips a header row with cells.
///
/// Blank headers become `col_{i}`. Short rows are padded with nulls; extra
/// cells beyond the header keep positional `col_{i}` keys.
pub(crate) fn row_record<I>(headers: &[String], cells: I) -> RawRecord
where
    I: IntoIterator<Item = Value>,
{
    let mut record = RawRecord::new();
    let mut seen = 0;
    for (idx, cell) in cells.into_iter().enumerate() {
        record.insert(column_name(headers, idx), cell);
        seen = idx + 1;
    }
    for idx in seen..headers.len() {
        record.insert(column_name(headers, idx), Value::Null);
    }
    record
}

fn column_name(headers: &[String], idx: usize) -> String {
    match headers.get(idx).map(|h| h.trim()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("col_{idx}"),
    }
}
