//! Storage engine for the tick store
//!
//! This crate handles everything that touches disk:
//!
//! - Codec: delta-encoded tick records with per-record checksums, plus
//!   decoders for every historical data version
//! - Blocked files: fixed-size blocks with verified headers
//! - Legacy streams: the older unblocked record chain, read and appended
//! - Format selector: one handle over both formats
//! - Write pipeline: background writer with unbounded retries
//! - Durable flush, file cache and configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block; // Block store (TickBlock, BlockTickFile)
pub mod cache; // Byte cache for legacy reads
pub mod codec; // Tick record codec
pub mod config; // StoreConfig and tickstore.toml
pub mod format; // File and block headers
pub mod legacy; // Unblocked legacy stream
pub mod pipeline; // Background write pipeline
pub mod platform; // Durable flush per platform
pub mod selector; // Format selector (TickFile)
pub mod stream; // TickStream trait and open options
pub mod testing; // Fixtures for compatibility tests

// === Re-exports ===

pub use block::{scan_blocks, BlockSummary, BlockTickFile, TickBlock};
pub use cache::{CacheStats, FileCache, DEFAULT_CACHE_BUDGET};
pub use codec::{
    is_supported_version, DecodedRecord, FormatRules, TickDecoder, TickEncoder,
    CURRENT_DATA_VERSION, FIRST_TAGGED_VERSION,
};
pub use config::{ConfigError, StoreConfig, CONFIG_FILE_NAME, TICK_FILE_EXTENSION};
pub use format::{
    BlockHeader, FileHeader, BLOCK_HEADER_SIZE, DEFAULT_BLOCK_SIZE, FILE_HEADER_SIZE,
    MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};
pub use legacy::LegacyTickFile;
pub use pipeline::{
    BlockSink, FileSink, PipelineCounters, PipelineStats, WritePipeline, DEFAULT_RETRY_DELAY,
    WRITER_THREAD_NAME,
};
pub use platform::durable_flush;
pub use selector::{read_all, TickFile};
pub use stream::{
    FileMode, ReadFilter, StoreFormat, TickFileOptions, TickStream, DEFAULT_LEGACY_FLUSH_THRESHOLD,
};
