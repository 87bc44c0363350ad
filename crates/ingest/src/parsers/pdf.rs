//! PDF statements.
//!
//! Pages are read through their embedded text layer. A page whose lines
//! line up into columns yields table rows; a page without a table falls
//! back to line recognition against a fixed trade header set.
use std::sync::{Arc, LazyLock};

use lopdf::Document;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{row_record, text_cell, Parser};
use crate::error::IngestError;
use crate::types::RawRecord;

/// Headers used when a page has no detectable table.
pub const TRADE_HEADERS: [&str; 14] = [
    "TradeID",
    "TradeDate",
    "Instrument",
    "Symbol",
    "TradeType",
    "Quantity",
    "Price",
    "CustomerID",
    "TradeValue",
    "Fee",
    "NetValue",
    "PnL",
    "SettlementDate",
    "RiskCategory",
];

/// One capture group per entry of [`TRADE_HEADERS`].
pub const TRADE_LINE_PATTERN: &str = r"^(\d+)\s+(\d{1,2}/\d{1,2}/\d{4})\s+(\w+)\s+(\w+)\s+(\w+)\s+([\d,]+)\s+([\d.]+)\s+(\d+)\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)\s+(-?[\d.]+)\s+(\d{1,2}/\d{1,2}/\d{4})\s+(\w+)";

/// Page handed to a [`TextRecognizer`].
#[derive(Debug, Clone, Copy)]
pub struct PdfPage<'a> {
    /// 1-based page number.
    pub number: u32,
    /// Text extracted from the page's text layer; may be empty for scans.
    pub text: &'a str,
}

/// Produces line-oriented text for a page without a table.
///
/// The default reads the embedded text layer. An OCR engine plugs in here
/// for scanned statements.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, page: &PdfPage<'_>) -> Option<String>;
}

/// Uses the page's embedded text as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTextRecognizer;

impl TextRecognizer for EmbeddedTextRecognizer {
    fn recognize(&self, page: &PdfPage<'_>) -> Option<String> {
        (!page.text.trim().is_empty()).then(|| page.text.to_string())
    }
}

pub struct PdfParser {
    headers: Vec<String>,
    line_pattern: Option<Regex>,
    recognizer: Arc<dyn TextRecognizer>,
}

impl Default for PdfParser {
    fn default() -> Self {
        Self {
            headers: TRADE_HEADERS.iter().map(|h| h.to_string()).collect(),
            line_pattern: Some(TRADE_LINE.clone()),
            recognizer: Arc::new(EmbeddedTextRecognizer),
        }
    }
}

impl PdfParser {
    /// Fallback headers without a line pattern; lines are split on whitespace.
    pub fn with_headers(headers: Vec<String>) -> Self {
        Self {
            headers,
            line_pattern: None,
            ..Self::default()
        }
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    /// Rows for one page: table rows when a table is found, recognized
    /// lines otherwise.
    pub fn page_records(&self, page: &PdfPage<'_>) -> Vec<RawRecord> {
        let tables = extract_tables(page.text);
        if !tables.is_empty() {
            return tables.iter().flat_map(|table| table_records(table)).collect();
        }
        match self.recognizer.recognize(page) {
            Some(text) => self.recognize_lines(&text),
            None => Vec::new(),
        }
    }

    /// Line recognition: scrub scanning artifacts, try the line pattern,
    /// fall back to whitespace tokens. Every row carries exactly the
    /// configured headers.
    pub fn recognize_lines(&self, text: &str) -> Vec<RawRecord> {
        let cleaned = ARTIFACTS.replace_all(text, " ");
        cleaned
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let flattened = line.replace(',', "");
                let cells: Vec<Value> = match self
                    .line_pattern
                    .as_ref()
                    .and_then(|pattern| pattern.captures(&flattened))
                {
                    Some(caps) => caps
                        .iter()
                        .skip(1)
                        .map(|group| group.map_or(Value::Null, |m| text_cell(m.as_str())))
                        .collect(),
                    None => line.split_whitespace().map(text_cell).collect(),
                };
                self.fixed_header_record(cells)
            })
            .collect()
    }

    fn fixed_header_record(&self, cells: Vec<Value>) -> RawRecord {
        let mut cells = cells.into_iter();
        self.headers
            .iter()
            .map(|header| (header.clone(), cells.next().unwrap_or(Value::Null)))
            .collect()
    }
}

impl Parser for PdfParser {
    fn id(&self) -> &'static str {
        "pdf"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|err| IngestError::malformed(self.id(), err))?;
        let mut records = Vec::new();
        for number in document.get_pages().into_keys() {
            let text = match document.extract_text(&[number]) {
                Ok(text) => text,
                Err(err) => {
                    debug!(page = number, error = %err, "pdf_page_text_unavailable");
                    String::new()
                }
            };
            records.extend(self.page_records(&PdfPage {
                number,
                text: &text,
            }));
        }
        Ok(records)
    }
}

static TRADE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TRADE_LINE_PATTERN).expect("trade line pattern is valid"));

static ARTIFACTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\]|)]").expect("artifact pattern is valid"));

static COLUMN_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+|\s{2,}").expect("column gap pattern is valid"));

/// Groups consecutive lines with the same column count (at least two
/// columns, at least two lines) into tables. First line is the header.
fn extract_tables(text: &str) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let cells: Vec<String> = if line.is_empty() {
            Vec::new()
        } else {
            COLUMN_GAP.split(line).map(|c| c.trim().to_string()).collect()
        };
        let continues = cells.len() >= 2
            && current.first().map_or(true, |header| header.len() == cells.len());
        if continues {
            current.push(cells);
            continue;
        }
        if current.len() >= 2 {
            tables.push(std::mem::take(&mut current));
        }
        current = if cells.len() >= 2 { vec![cells] } else { Vec::new() };
    }
    if current.len() >= 2 {
        tables.push(current);
    }
    tables
}

fn table_records(table: &[Vec<String>]) -> Vec<RawRecord> {
    let Some((headers, rows)) = table.split_first() else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| row_record(headers, row.iter().map(|cell| text_cell(cell))))
        .collect()
}

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use serde_json::json;

    use super::*;

    /// One page per entry; every line is its own text object.
    fn pdf_bytes(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let mut operations = Vec::new();
            for (idx, line) in lines.iter().enumerate() {
                let y = 780 - 14 * idx as i64;
                operations.extend([
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 10.into()]),
                    Operation::new("Td", vec![40.into(), y.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ]);
            }
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn parses_table_and_trade_line_pages() {
        let bytes = pdf_bytes(&[
            &["Customer_ID  Amount", "C1  10.50", "C2  3"],
            &["1001 01/15/2024 Equity AAPL Buy 100 150.25 42 15025.00 10.00 15015.00 -230.75 01/17/2024 High"],
        ]);
        let records = PdfParser::default().parse(&bytes).expect("parse pdf");
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].get("Customer_ID"), Some(&json!("C1")));
        assert_eq!(records[0].get("Amount"), Some(&json!("10.50")));
        assert_eq!(records[1].get("Customer_ID"), Some(&json!("C2")));

        let trade = &records[2];
        assert_eq!(trade.len(), TRADE_HEADERS.len());
        assert_eq!(trade.get("TradeID"), Some(&json!("1001")));
        assert_eq!(trade.get("CustomerID"), Some(&json!("42")));
        assert_eq!(trade.get("SettlementDate"), Some(&json!("01/17/2024")));
    }

    #[test]
    fn aligned_lines_become_table_rows() {
        let text = "Statement for March\n\
                    Date        Description      Amount\n\
                    03/01/2024  Coffee shop      4.50\n\
                    03/02/2024  Grocery          52.10\n\
                    Page 1";
        let parser = PdfParser::default();
        let records = parser.page_records(&PdfPage { number: 1, text });
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Description"), Some(&json!("Coffee shop")));
        assert_eq!(records[1].get("Amount"), Some(&json!("52.10")));
    }

    #[test]
    fn trade_lines_match_pattern() {
        let text = "1001 01/15/2024 Equity AAPL Buy 1,000 185.20 42 185200.00 12.5 185187.50 -230.75 01/17/2024 High|";
        let records = PdfParser::default().recognize_lines(text);
        assert_eq!(records.len(), 1);
        let row = &records[0];
        assert_eq!(row.len(), TRADE_HEADERS.len());
        assert_eq!(row.get("TradeID"), Some(&json!("1001")));
        assert_eq!(row.get("Quantity"), Some(&json!("1000")));
        assert_eq!(row.get("CustomerID"), Some(&json!("42")));
        assert_eq!(row.get("NetValue"), Some(&json!("185187.50")));
        assert_eq!(row.get("PnL"), Some(&json!("-230.75")));
        assert_eq!(row.get("RiskCategory"), Some(&json!("High")));
    }

    #[test]
    fn unmatched_lines_split_on_whitespace() {
        let records = PdfParser::default().recognize_lines("1002 02/01/2024 Bond");
        let row = &records[0];
        assert_eq!(row.get("TradeID"), Some(&json!("1002")));
        assert_eq!(row.get("Instrument"), Some(&json!("Bond")));
        assert_eq!(row.get("Symbol"), Some(&Value::Null));
        assert_eq!(row.len(), TRADE_HEADERS.len());
    }

    #[test]
    fn custom_headers_without_pattern() {
        let parser = PdfParser::with_headers(vec!["a".into(), "b".into()]);
        let records = parser.recognize_lines("x y z\n\n  \nq");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("b"), Some(&json!("y")));
        assert_eq!(records[1].get("b"), Some(&Value::Null));
    }

    struct FixedRecognizer;

    impl TextRecognizer for FixedRecognizer {
        fn recognize(&self, _page: &PdfPage<'_>) -> Option<String> {
            Some("7 x".into())
        }
    }

    #[test]
    fn scanned_page_uses_recognizer() {
        let parser = PdfParser::default().with_recognizer(Arc::new(FixedRecognizer));
        let records = parser.page_records(&PdfPage { number: 3, text: "" });
        assert_eq!(records[0].get("TradeID"), Some(&json!("7")));
    }

    #[test]
    fn blank_page_yields_nothing() {
        let records = PdfParser::default().page_records(&PdfPage { number: 1, text: "  " });
        assert!(records.is_empty());
    }

    #[test]
    fn non_pdf_bytes_are_malformed() {
        assert!(matches!(
            PdfParser::default().parse(b"plain text"),
            Err(IngestError::MalformedFile { format: "pdf", .. })
        ));
    }
}
