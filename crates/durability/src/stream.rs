//! Uniform interface of tick files
//!
//! Both on-disk formats, and the selector in front of them, implement
//! [`TickStream`]. Options common to every format are carried by
//! [`TickFileOptions`].

use crate::cache::FileCache;
use crate::format::DEFAULT_BLOCK_SIZE;
use crate::pipeline::DEFAULT_RETRY_DELAY;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tickstore_core::{StoreResult, Tick, Timestamp};

/// Default size at which a legacy write buffer is handed to the writer.
pub const DEFAULT_LEGACY_FLUSH_THRESHOLD: usize = 5_000;

/// How a tick file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    /// Read an existing file
    #[default]
    Read,
    /// Append to an existing file, creating it if missing
    Write,
    /// Replace any existing file
    Overwrite,
}

impl FileMode {
    /// True for the modes that write
    pub fn is_write(&self) -> bool {
        !matches!(self, FileMode::Read)
    }
}

/// On-disk format of a tick file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// Fixed-size blocks with integrity headers
    #[default]
    Blocked,
    /// One continuous record chain
    Legacy,
}

/// Restricts which ticks a read returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadFilter {
    /// Ticks before this time are skipped
    pub start_time: Option<Timestamp>,
    /// Reading stops at the first tick after this time
    pub end_time: Option<Timestamp>,
    /// At most this many ticks are returned
    pub max_count: Option<u64>,
}

impl ReadFilter {
    /// Filter that admits everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Skip ticks before `start`
    pub fn with_start_time(mut self, start: Timestamp) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Stop after `end`
    pub fn with_end_time(mut self, end: Timestamp) -> Self {
        self.end_time = Some(end);
        self
    }

    /// Return at most `count` ticks
    pub fn with_max_count(mut self, count: u64) -> Self {
        self.max_count = Some(count);
        self
    }

    /// True if a tick at `time` comes before the window
    pub fn is_before(&self, time: Timestamp) -> bool {
        self.start_time.is_some_and(|start| time < start)
    }

    /// True if a tick at `time` comes after the window
    pub fn is_after(&self, time: Timestamp) -> bool {
        self.end_time.is_some_and(|end| time > end)
    }

    /// True once `returned` ticks exhaust the count limit
    pub fn is_exhausted(&self, returned: u64) -> bool {
        self.max_count.is_some_and(|max| returned >= max)
    }
}

/// Options for opening a tick file.
#[derive(Debug, Clone)]
pub struct TickFileOptions {
    /// Open mode
    pub mode: FileMode,
    /// Read window
    pub filter: ReadFilter,
    /// Block size for newly created blocked files
    pub block_size: usize,
    /// Delay between write retries
    pub retry_delay: Duration,
    /// Legacy buffer size that triggers a hand-off to the writer
    pub legacy_flush_threshold: usize,
    /// Format of newly created files
    pub format: StoreFormat,
    /// Shared cache for legacy reads
    pub cache: Option<Arc<FileCache>>,
}

impl Default for TickFileOptions {
    fn default() -> Self {
        TickFileOptions {
            mode: FileMode::Read,
            filter: ReadFilter::all(),
            block_size: DEFAULT_BLOCK_SIZE,
            retry_delay: DEFAULT_RETRY_DELAY,
            legacy_flush_threshold: DEFAULT_LEGACY_FLUSH_THRESHOLD,
            format: StoreFormat::Blocked,
            cache: None,
        }
    }
}

impl TickFileOptions {
    /// Options for reading
    pub fn read() -> Self {
        Self::default()
    }

    /// Options for writing (append or create)
    pub fn write() -> Self {
        Self::default().with_mode(FileMode::Write)
    }

    /// Set the open mode
    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the read window
    pub fn with_filter(mut self, filter: ReadFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the block size of new files
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the write retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the legacy buffer hand-off size
    pub fn with_legacy_flush_threshold(mut self, bytes: usize) -> Self {
        self.legacy_flush_threshold = bytes;
        self
    }

    /// Set the format of new files
    pub fn with_format(mut self, format: StoreFormat) -> Self {
        self.format = format;
        self
    }

    /// Use a shared file cache for legacy reads
    pub fn with_cache(mut self, cache: Arc<FileCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Read/write access to one symbol's tick file.
pub trait TickStream {
    /// Buffer `tick` for writing. Returns `true` once it is accepted.
    fn try_write_tick(&mut self, tick: &Tick) -> StoreResult<bool>;

    /// Next tick passing the read filter, `None` at the end.
    fn try_read_tick(&mut self) -> StoreResult<Option<Tick>>;

    /// Last tick written or read
    fn last_tick(&self) -> Option<&Tick>;

    /// Hand every buffered tick to the writer and wait until it is written
    fn flush(&mut self) -> StoreResult<()>;

    /// Flush, make the file durable and release it
    fn close(&mut self) -> StoreResult<()>;

    /// File length in bytes
    fn length(&self) -> u64;

    /// Current byte position (next read, or end of written data)
    fn position(&self) -> u64;

    /// Data version of the records last read or being written
    fn data_version(&self) -> Option<u8>;
}
