//! Destinations for pipeline buffers.

use crate::platform::durable_flush;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tickstore_core::StoreResult;

/// Append-only byte destination used by the write pipeline.
///
/// A failed `write_all_at_end` may have written part of the buffer; the next
/// call must start again from the last committed position.
pub trait BlockSink: Send {
    /// Append `bytes` after everything committed so far.
    fn write_all_at_end(&mut self, bytes: &[u8]) -> StoreResult<()>;

    /// Persist data and metadata to stable storage.
    fn sync_durable(&mut self) -> StoreResult<()>;

    /// Committed length in bytes
    fn committed_len(&self) -> u64;
}

/// [`BlockSink`] writing to a file.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
    committed: u64,
}

impl FileSink {
    /// Create or truncate `path`.
    pub fn create(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(FileSink {
            file,
            path: path.to_path_buf(),
            committed: 0,
        })
    }

    /// Open an existing file, appending after its current end.
    pub fn append(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new().write(true).open(path)?;
        let committed = file.metadata()?.len();
        Ok(FileSink {
            file,
            path: path.to_path_buf(),
            committed,
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockSink for FileSink {
    fn write_all_at_end(&mut self, bytes: &[u8]) -> StoreResult<()> {
        // Rewinding drops whatever a failed attempt left behind
        self.file.seek(SeekFrom::Start(self.committed))?;
        self.file.write_all(bytes)?;
        self.committed += bytes.len() as u64;
        Ok(())
    }

    fn sync_durable(&mut self) -> StoreResult<()> {
        self.file.flush()?;
        if self.file.metadata()?.len() != self.committed {
            self.file.set_len(self.committed)?;
        }
        durable_flush(&self.file)?;
        Ok(())
    }

    fn committed_len(&self) -> u64 {
        self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sink.bin");
        let mut sink = FileSink::create(&path).unwrap();
        sink.write_all_at_end(b"abc").unwrap();
        sink.write_all_at_end(b"def").unwrap();
        sink.sync_durable().unwrap();
        assert_eq!(sink.committed_len(), 6);
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");

        drop(sink);
        let mut sink = FileSink::append(&path).unwrap();
        assert_eq!(sink.committed_len(), 6);
        sink.write_all_at_end(b"g").unwrap();
        sink.sync_durable().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdefg");
    }

    #[test]
    fn test_sync_trims_uncommitted_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sink.bin");
        let mut sink = FileSink::create(&path).unwrap();
        sink.write_all_at_end(b"abc").unwrap();
        // Simulate a partial write past the committed end
        sink.file.write_all(b"zz").unwrap();
        sink.sync_durable().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }
}
