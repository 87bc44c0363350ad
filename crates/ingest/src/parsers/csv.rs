//! Delimited text (CSV, TSV).
use ::csv::{ReaderBuilder, Trim};

use super::{row_record, text_cell, Parser};
use crate::error::IngestError;
use crate::types::RawRecord;

/// Header-row delimited parser. Every cell is emitted as a string or null.
#[derive(Debug, Clone, Copy)]
pub struct CsvParser {
    delimiter: u8,
}

impl CsvParser {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn tsv() -> Self {
        Self { delimiter: b'\t' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for CsvParser {
    fn id(&self) -> &'static str {
        if self.delimiter == b'\t' {
            "tsv"
        } else {
            "csv"
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| IngestError::malformed(self.id(), err))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(IngestError::malformed(self.id(), "missing header row"));
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| IngestError::malformed(self.id(), err))?;
            records.push(row_record(&headers, row.iter().map(text_cell)));
        }
        Ok(records)
    }
}
