//! Error types for the eiasset library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for asset operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Archive header, table or names blob is invalid
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// Entry name not present when opening for read
    #[error("Entry not found: {0}")]
    UnknownEntry(String),

    /// Sub-stream discipline violated (mode misuse on archive or entry)
    #[error("Stream discipline: {0}")]
    StreamDiscipline(String),

    /// Record signature or variant flag inconsistent with the bytes at hand
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Link graph has zero/multiple roots or references an undefined part
    #[error("Hierarchy error: {0}")]
    HierarchyError(String),

    /// Fewer bytes available than a fixed-size field requires
    #[error("Truncated record: need {needed} bytes, {available} available")]
    TruncatedRecord { needed: usize, available: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed-archive error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedArchive(msg.into())
    }

    /// Create a stream-discipline error.
    pub fn discipline(msg: impl Into<String>) -> Self {
        Self::StreamDiscipline(msg.into())
    }

    /// Create a format-mismatch error.
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::FormatMismatch(msg.into())
    }

    /// Create a hierarchy error.
    pub fn hierarchy(msg: impl Into<String>) -> Self {
        Self::HierarchyError(msg.into())
    }
}

/// Result type alias for asset operations.
pub type Result<T> = std::result::Result<T, Error>;
