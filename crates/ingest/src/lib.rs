//! Mart ingest layer
//!
//! Batch files enter the data mart here. A file arrives as raw bytes plus a
//! format tag (its extension); the [`ParserRegistry`] picks a parser for the
//! tag and the parser turns the bytes into a list of [`RawRecord`]s, one per
//! row, keyed by the source column names.
//!
//! ## What we do here
//!
//! - **Dispatch by format** - `csv`, `tsv`, `xls`/`xlsx`, `json`, `xml` and
//!   `pdf` are built in. New formats are one [`ParserRegistry::register`]
//!   call away.
//! - **Fail whole files** - a file that does not decode as its format fails
//!   with [`IngestError::MalformedFile`]; nothing is emitted for it.
//! - **Keep source shape** - column names and order are preserved; key
//!   folding and cleanup belong to the normalization stage.
//! - **Log everything** - each parse runs in an `ingest.parse` span and ends
//!   with a `parse_success` or `parse_failure` event.
//!
//! ## Example
//!
//! ```
//! use ingest::ParserRegistry;
//! use serde_json::json;
//!
//! let registry = ParserRegistry::with_builtin();
//! let records = registry
//!     .parse("csv", b"Customer_ID,Amount\nC1,12.50\n")
//!     .unwrap();
//!
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].get("Amount"), Some(&json!("12.50")));
//! ```
mod config;
mod error;
mod parsers;
mod registry;
mod types;

pub use crate::config::{default_formats, ConfigError, IngestConfig};
pub use crate::error::IngestError;
pub use crate::parsers::{
    excel_serial_to_text, CsvParser, EmbeddedTextRecognizer, ExcelParser, JsonParser, Parser,
    PdfPage, PdfParser, TextRecognizer, XmlParser, TRADE_HEADERS, TRADE_LINE_PATTERN,
};
pub use crate::registry::{
    builtin_factory, format_from_file_name, normalize_format_tag, ParserFactory, ParserRegistry,
    BUILTIN_PARSERS,
};
pub use crate::types::{Fields, RawRecord};

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn same_rows_from_every_text_format() {
        let registry = ParserRegistry::with_builtin();
        let csv = registry
            .parse("csv", b"Customer_ID,Amount\nC1,12.50\n")
            .expect("csv");
        let json = registry
            .parse("json", br#"[{"Customer_ID":"C1","Amount":"12.50"}]"#)
            .expect("json");
        let xml = registry
            .parse(
                "xml",
                b"<rows><row><Customer_ID>C1</Customer_ID><Amount>12.50</Amount></row></rows>",
            )
            .expect("xml");
        assert_eq!(csv, json);
        assert_eq!(json, xml);
    }

    #[test]
    fn parse_is_deterministic() {
        let registry = ParserRegistry::with_builtin();
        let bytes = b"a,b\n1,2\n3,4\n";
        let first = registry.parse("csv", bytes).expect("first");
        let second = registry.parse("csv", bytes).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_file_emits_nothing() {
        let registry = ParserRegistry::with_builtin();
        let result = registry.parse("json", br#"[{"a":1},"#);
        assert!(matches!(result, Err(IngestError::MalformedFile { .. })));
    }

    #[test]
    fn uppercase_extension_dispatches() {
        let registry = ParserRegistry::with_builtin();
        let records = registry.parse("JSON", br#"[{"x":null}]"#).expect("json");
        assert_eq!(records[0].get("x"), Some(&Value::Null));
        assert_eq!(records[0].len(), 1);
    }
}
