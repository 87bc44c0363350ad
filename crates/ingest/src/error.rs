//! Error types produced by the ingest crate.
//!
//! Every failure here is file-level: when a parser cannot make sense of a
//! batch, the whole batch is refused and no records are emitted. Row-level
//! problems are not errors at this layer; they surface later as field
//! rejections during validation.
//!
//! | Error | Meaning |
//! |-------|---------|
//! | [`UnsupportedFormat`](IngestError::UnsupportedFormat) | No parser is registered for the format tag |
//! | [`MalformedFile`](IngestError::MalformedFile) | The bytes do not decode as the declared format |
//! | [`FileTooLarge`](IngestError::FileTooLarge) | The batch exceeds the configured byte ceiling |
//!
//! ```rust
//! use ingest::{IngestError, ParserRegistry};
//!
//! let registry = ParserRegistry::with_builtin();
//! match registry.resolve("parquet") {
//!     Err(IngestError::UnsupportedFormat(tag)) => assert_eq!(tag, "parquet"),
//!     _ => unreachable!("parquet is not a built-in format"),
//! }
//! ```
use std::fmt::Display;

use thiserror::Error;

/// Errors that can occur while turning a batch file into raw records.
///
/// All variants are cloneable and comparable so callers can carry them into
/// audit summaries and assert on them in tests. The enum is
/// `#[non_exhaustive]`; match with a catch-all arm.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IngestError {
    /// The format tag has no registered parser.
    ///
    /// Carries the tag exactly as the caller supplied it.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The file could not be decoded as its declared format.
    ///
    /// Covers bad encodings, syntax errors, a JSON top level that is not an
    /// array of objects, and unreadable spreadsheets or PDFs.
    #[error("malformed {format} file: {reason}")]
    MalformedFile {
        /// Parser id that rejected the bytes.
        format: &'static str,
        /// Human-readable decoder message.
        reason: String,
    },

    /// The file exceeds [`IngestConfig::max_file_bytes`](crate::IngestConfig::max_file_bytes).
    #[error("file size {size} exceeds limit of {limit} bytes")]
    FileTooLarge {
        /// Size of the offered batch in bytes.
        size: usize,
        /// Configured ceiling.
        limit: usize,
    },
}

impl IngestError {
    /// Shorthand for [`IngestError::MalformedFile`].
    pub fn malformed(format: &'static str, reason: impl Display) -> Self {
        Self::MalformedFile {
            format,
            reason: reason.to_string(),
        }
    }

    /// Stable label used in logs and audit comments.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::MalformedFile { .. } => "malformed_file",
            Self::FileTooLarge { .. } => "file_too_large",
        }
    }
}
