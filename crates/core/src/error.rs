//! Error types for the tick store
//!
//! One error enum covers the whole store. The variants follow how callers
//! are expected to react:
//!
//! | Variant | Reaction |
//! |---------|----------|
//! | `Corruption` | fatal, always propagated |
//! | `UnsupportedVersion` | fatal, always propagated |
//! | `StructuralValidation` | recovered by the format selector (legacy fallback) |
//! | `FileNotFound` | fatal on read; writers create the file instead |
//! | `Io` | write-side I/O is retried by the pipeline, read-side I/O is fatal |
//! | `ReentrantDrain` | programming error, propagated |

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the tick store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Checksum mismatch on a record or block header
    #[error(
        "Data corruption in {file} at offset {offset}: expected checksum {expected:#x}, computed {computed:#x} ({detail})"
    )]
    Corruption {
        /// File (or stream) the corrupted bytes came from
        file: String,
        /// Byte offset of the offending record or block
        offset: u64,
        /// Checksum stored on disk
        expected: i64,
        /// Checksum recomputed from the decoded values
        computed: i64,
        /// Extra diagnostics (raw header bytes, record version)
        detail: String,
    },

    /// No decoder exists for a record's format version
    #[error("Unsupported tick format version {version} at offset {offset}")]
    UnsupportedVersion {
        /// Version byte read from the record
        version: u8,
        /// Byte offset of the record
        offset: u64,
    },

    /// The file does not have the blocked layout (wrong type tag, version or
    /// header checksum). The format selector falls back to the legacy stream.
    #[error("Structural validation failed: {0}")]
    StructuralValidation(String),

    /// File to read does not exist
    #[error("Tick file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Record bytes are truncated or garbled
    #[error("Invalid record at offset {offset}: {detail}")]
    InvalidRecord {
        /// Byte offset of the record
        offset: u64,
        /// What was wrong
        detail: String,
    },

    /// The write pipeline drain was entered while already running
    #[error("Write pipeline drain invoked while a drain is already running")]
    ReentrantDrain,

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Build a corruption error
    pub fn corruption(
        file: impl Into<String>,
        offset: u64,
        expected: i64,
        computed: i64,
        detail: impl Into<String>,
    ) -> Self {
        StoreError::Corruption {
            file: file.into(),
            offset,
            expected,
            computed,
            detail: detail.into(),
        }
    }

    /// Build an invalid record error
    pub fn invalid_record(offset: u64, detail: impl Into<String>) -> Self {
        StoreError::InvalidRecord {
            offset,
            detail: detail.into(),
        }
    }

    /// True for checksum failures
    pub fn is_corruption(&self) -> bool {
        matches!(self, StoreError::Corruption { .. })
    }

    /// True when the error only means "not the blocked format"
    pub fn is_structural(&self) -> bool {
        matches!(self, StoreError::StructuralValidation(_))
    }

    /// Attach a file name to a corruption error raised without one
    pub fn in_file(self, name: &str) -> Self {
        match self {
            StoreError::Corruption {
                file,
                offset,
                expected,
                computed,
                detail,
            } if file.is_empty() => StoreError::Corruption {
                file: name.to_string(),
                offset,
                expected,
                computed,
                detail,
            },
            other => other,
        }
    }
}
