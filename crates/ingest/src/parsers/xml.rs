//! XML documents shaped as `<root><row><field>text</field>...</row>...</root>`.
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use super::{text_cell, Parser};
use crate::error::IngestError;
use crate::types::RawRecord;

/// Each child of the root element is one record; each grandchild is one
/// field, keyed by tag name with its leading text as value. Deeper
/// descendants are ignored and attributes are not read.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

const RECORD_DEPTH: usize = 2;
const FIELD_DEPTH: usize = 3;

impl Parser for XmlParser {
    fn id(&self) -> &'static str {
        "xml"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;
        let mut records = Vec::new();
        let mut current: Option<RawRecord> = None;
        let mut field: Option<(String, String, bool)> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|err| IngestError::malformed(self.id(), err))?;
            match event {
                Event::Start(start) => {
                    depth += 1;
                    match depth {
                        1 => saw_root = true,
                        RECORD_DEPTH => current = Some(RawRecord::new()),
                        FIELD_DEPTH => {
                            let name = self.tag_name(start.name().as_ref())?;
                            field = Some((name, String::new(), false));
                        }
                        _ => {
                            // Text after a nested child is a tail, not the field's text.
                            if let Some((_, _, closed)) = field.as_mut() {
                                *closed = true;
                            }
                        }
                    }
                }
                Event::Empty(empty) => match depth + 1 {
                    1 => saw_root = true,
                    RECORD_DEPTH => records.push(RawRecord::new()),
                    FIELD_DEPTH => {
                        let name = self.tag_name(empty.name().as_ref())?;
                        if let Some(record) = current.as_mut() {
                            record.insert(name, Value::Null);
                        }
                    }
                    _ => {
                        if let Some((_, _, closed)) = field.as_mut() {
                            *closed = true;
                        }
                    }
                },
                Event::Text(text) if depth == FIELD_DEPTH => {
                    if let Some((_, value, false)) = field.as_mut() {
                        let unescaped = text
                            .unescape()
                            .map_err(|err| IngestError::malformed(self.id(), err))?;
                        value.push_str(&unescaped);
                    }
                }
                Event::CData(data) if depth == FIELD_DEPTH => {
                    if let Some((_, value, false)) = field.as_mut() {
                        value.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::End(_) => {
                    match depth {
                        FIELD_DEPTH => {
                            if let (Some((name, value, _)), Some(record)) =
                                (field.take(), current.as_mut())
                            {
                                record.insert(name, text_cell(&value));
                            }
                        }
                        RECORD_DEPTH => {
                            if let Some(record) = current.take() {
                                records.push(record);
                            }
                        }
                        _ => {}
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(IngestError::malformed(self.id(), "document has no root element"));
        }
        if depth != 0 {
            return Err(IngestError::malformed(self.id(), "unexpected end of document"));
        }
        Ok(records)
    }
}

impl XmlParser {
    fn tag_name(&self, raw: &[u8]) -> Result<String, IngestError> {
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|err| IngestError::malformed(self.id(), err))
    }
}
