//! Spreadsheets (`xls`, `xlsx`). Only the first worksheet is read.
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate};
use serde_json::Value;

use super::{float_cell, row_record, text_cell, Parser};
use crate::error::IngestError;
use crate::types::RawRecord;

/// First-sheet spreadsheet parser. Row one is the header.
///
/// Numeric cells stay numeric, date cells become `YYYY-MM-DD` (or
/// `YYYY-MM-DD HH:MM:SS` when a time part is present), error cells are null.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcelParser;

impl Parser for ExcelParser {
    fn id(&self) -> &'static str {
        "excel"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|err| IngestError::malformed(self.id(), err))?;
        let range = match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => range,
            Some(Err(err)) => return Err(IngestError::malformed(self.id(), err)),
            None => return Err(IngestError::malformed(self.id(), "workbook has no worksheets")),
        };

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(Vec::new());
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        Ok(rows
            .filter(|row| !row.iter().all(|cell| matches!(cell, Data::Empty)))
            .map(|row| row_record(&headers, row.iter().map(cell_value)))
            .collect())
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(value) => Value::from(*value),
        Data::Float(value) => float_cell(*value),
        Data::String(value) => text_cell(value),
        Data::Bool(value) => Value::Bool(*value),
        Data::DateTime(value) => excel_serial_to_text(value.as_f64())
            .map(Value::String)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(value) | Data::DurationIso(value) => text_cell(value),
        _ => Value::Null,
    }
}

/// Converts an Excel serial date (days since 1899-12-30) to text.
///
/// ```rust
/// use ingest::excel_serial_to_text;
///
/// assert_eq!(excel_serial_to_text(45292.0).as_deref(), Some("2024-01-01"));
/// assert_eq!(excel_serial_to_text(45292.5).as_deref(), Some("2024-01-01 12:00:00"));
/// ```
pub fn excel_serial_to_text(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    // Serials far beyond the calendar range yield None instead of overflowing.
    let stamp = epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::try_days(days)?)?
        .checked_add_signed(Duration::try_seconds(seconds)?)?;
    if seconds == 0 {
        Some(stamp.date().format("%Y-%m-%d").to_string())
    } else {
        Some(stamp.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use rust_xlsxwriter::{Format, Workbook};
    use serde_json::json;

    use super::*;

    fn workbook_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let stamp = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Customer ID").unwrap();
        sheet.write_string(0, 1, "Amount").unwrap();
        sheet.write_string(0, 2, "Timestamp").unwrap();
        sheet.write_string(1, 0, "C1").unwrap();
        sheet.write_number(1, 1, 10.5).unwrap();
        sheet.write_number_with_format(1, 2, 45292.5, &stamp).unwrap();
        // Row 2 stays empty.
        sheet.write_string(3, 0, "C2").unwrap();
        sheet.write_number(3, 1, 7).unwrap();
        sheet.write_number_with_format(3, 2, 45293.0, &stamp).unwrap();

        let second = workbook.add_worksheet();
        second.write_string(0, 0, "ignored").unwrap();
        second.write_string(1, 0, "x").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn first_sheet_rows_become_records() {
        let records = ExcelParser.parse(&workbook_bytes()).expect("parse xlsx");
        assert_eq!(records.len(), 2);

        let headers: Vec<&String> = records[0].fields().keys().collect();
        assert_eq!(headers, ["Customer ID", "Amount", "Timestamp"]);
        assert_eq!(records[0].get("Customer ID"), Some(&json!("C1")));
        assert_eq!(records[0].get("Amount"), Some(&json!(10.5)));
        assert_eq!(records[0].get("Timestamp"), Some(&json!("2024-01-01 12:00:00")));

        assert_eq!(records[1].get("Amount"), Some(&json!(7)));
        assert_eq!(records[1].get("Timestamp"), Some(&json!("2024-01-02")));
        assert!(records.iter().all(|r| r.get("ignored").is_none()));
    }

    #[test]
    fn garbage_bytes_are_malformed() {
        assert!(matches!(
            ExcelParser.parse(b"definitely not a workbook"),
            Err(IngestError::MalformedFile { format: "excel", .. })
        ));
    }

    #[test]
    fn serial_dates_convert() {
        assert_eq!(excel_serial_to_text(1.0).as_deref(), Some("1899-12-31"));
        assert_eq!(excel_serial_to_text(45658.0).as_deref(), Some("2025-01-01"));
        assert_eq!(
            excel_serial_to_text(45658.25).as_deref(),
            Some("2025-01-01 06:00:00")
        );
        assert_eq!(excel_serial_to_text(-1.0), None);
        assert_eq!(excel_serial_to_text(f64::NAN), None);
    }

    #[test]
    fn out_of_range_serials_are_none() {
        assert_eq!(excel_serial_to_text(1.0e10), None);
        assert_eq!(excel_serial_to_text(1.0e14), None);
    }

    #[test]
    fn cells_map_to_json() {
        assert_eq!(cell_value(&Data::Int(7)), Value::from(7));
        assert_eq!(cell_value(&Data::Float(1.5)), Value::from(1.5));
        assert_eq!(cell_value(&Data::Float(2.0)), Value::from(2));
        assert_eq!(cell_value(&Data::String(" hi ".into())), Value::from("hi"));
        assert_eq!(cell_value(&Data::Empty), Value::Null);
    }
}
