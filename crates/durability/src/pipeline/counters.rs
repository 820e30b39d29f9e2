//! Write pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the writer thread.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    buffers_written: AtomicU64,
    bytes_written: AtomicU64,
    retries: AtomicU64,
    reentrant_drains: AtomicU64,
}

/// Point-in-time copy of [`PipelineCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Buffers handed to the sink successfully
    pub buffers_written: u64,
    /// Bytes handed to the sink successfully
    pub bytes_written: u64,
    /// Failed write attempts that were retried
    pub retries: u64,
    /// Writer drains rejected because another drain was running
    pub reentrant_drains: u64,
}

impl PipelineCounters {
    pub(crate) fn record_write(&self, bytes: usize) {
        self.buffers_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reentrant_drain(&self) {
        self.reentrant_drains.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            buffers_written: self.buffers_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            reentrant_drains: self.reentrant_drains.load(Ordering::Relaxed),
        }
    }
}
