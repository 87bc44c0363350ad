//! Format-keyed parser registry.
//!
//! The registry maps a format tag (a file extension such as `csv` or
//! `xlsx`) to a factory that builds a fresh [`Parser`]. Dispatch happens
//! through the trait object; adding a format means registering one more
//! factory, not editing a dispatch table.
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn, Level};

use crate::config::{ConfigError, IngestConfig};
use crate::error::IngestError;
use crate::parsers::{CsvParser, ExcelParser, JsonParser, Parser, PdfParser, XmlParser};
use crate::types::RawRecord;

/// Builds a parser on demand. Parsers are stateless, so one per batch is cheap.
pub type ParserFactory = Arc<dyn Fn() -> Box<dyn Parser> + Send + Sync>;

/// Parser ids understood by [`builtin_factory`].
pub const BUILTIN_PARSERS: [&str; 6] = ["csv", "tsv", "excel", "json", "xml", "pdf"];

/// Returns the factory for a built-in parser id.
pub fn builtin_factory(parser_id: &str) -> Option<ParserFactory> {
    let factory: ParserFactory = match parser_id {
        "csv" => Arc::new(|| Box::new(CsvParser::new())),
        "tsv" => Arc::new(|| Box::new(CsvParser::tsv())),
        "excel" => Arc::new(|| Box::new(ExcelParser)),
        "json" => Arc::new(|| Box::new(JsonParser)),
        "xml" => Arc::new(|| Box::new(XmlParser)),
        "pdf" => Arc::new(|| Box::new(PdfParser::default())),
        _ => return None,
    };
    Some(factory)
}

/// Lower-cases a tag and drops any leading dot, so `.XLSX` and `xlsx` agree.
pub fn normalize_format_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Derives the format tag from a file name's extension.
///
/// ```rust
/// use ingest::format_from_file_name;
///
/// assert_eq!(format_from_file_name("trades_2024.XLSX").as_deref(), Some("xlsx"));
/// assert_eq!(format_from_file_name("README"), None);
/// ```
pub fn format_from_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_format_tag)
        .filter(|tag| !tag.is_empty())
}

/// Format tag to parser factory, plus the batch size ceiling.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    factories: HashMap<String, ParserFactory>,
    max_file_bytes: Option<usize>,
}

impl ParserRegistry {
    /// An empty registry; every format is unsupported until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in format table.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for (tag, parser_id) in crate::config::default_formats() {
            if let Some(factory) = builtin_factory(&parser_id) {
                registry.register(&tag, factory);
            }
        }
        registry
    }

    /// Registry built from configuration. The config is validated first.
    pub fn from_config(cfg: &IngestConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let mut registry = Self::new();
        registry.max_file_bytes = cfg.max_file_bytes;
        for (tag, parser_id) in &cfg.formats {
            let factory = builtin_factory(parser_id).ok_or_else(|| ConfigError::UnknownParser {
                format: tag.clone(),
                parser: parser_id.clone(),
            })?;
            registry.register(tag, factory);
        }
        Ok(registry)
    }

    /// Adds or replaces the parser for `tag`.
    pub fn register(&mut self, tag: &str, factory: ParserFactory) {
        let tag = normalize_format_tag(tag);
        if self.factories.insert(tag.clone(), factory).is_some() {
            debug!(format = %tag, "parser_replaced");
        }
    }

    pub fn set_max_file_bytes(&mut self, limit: Option<usize>) {
        self.max_file_bytes = limit;
    }

    /// Looks up the parser for `tag`.
    pub fn resolve(&self, tag: &str) -> Result<Box<dyn Parser>, IngestError> {
        self.factories
            .get(&normalize_format_tag(tag))
            .map(|factory| factory())
            .ok_or_else(|| IngestError::UnsupportedFormat(tag.to_string()))
    }

    pub fn supports(&self, tag: &str) -> bool {
        self.factories.contains_key(&normalize_format_tag(tag))
    }

    /// Registered tags in sorted order.
    pub fn formats(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.factories.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Parses a whole batch: size check, parser lookup, decode.
    ///
    /// Either every row of the file comes back or the batch fails with a
    /// file-level [`IngestError`]; there is no partial output.
    pub fn parse(&self, tag: &str, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
        let start = Instant::now();
        let span = tracing::span!(Level::INFO, "ingest.parse", format = %tag, size = bytes.len());
        let _guard = span.enter();

        match self.parse_inner(tag, bytes) {
            Ok(records) => {
                let elapsed_micros = start.elapsed().as_micros();
                info!(records = records.len(), elapsed_micros, "parse_success");
                Ok(records)
            }
            Err(err) => {
                let elapsed_micros = start.elapsed().as_micros();
                warn!(error = %err, kind = err.kind(), elapsed_micros, "parse_failure");
                Err(err)
            }
        }
    }

    fn parse_inner(&self, tag: &str, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
        if let Some(limit) = self.max_file_bytes {
            if bytes.len() > limit {
                return Err(IngestError::FileTooLarge {
                    size: bytes.len(),
                    limit,
                });
            }
        }
        let parser = self.resolve(tag)?;
        parser.parse(bytes)
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.formats())
            .field("max_file_bytes", &self.max_file_bytes)
            .finish()
    }
}
