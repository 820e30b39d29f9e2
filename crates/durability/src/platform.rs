//! Platform-specific durable flush.
//!
//! Closing a file in write mode must leave both its data and its metadata
//! (length, timestamps) on stable storage.

use std::fs::File;
use std::io;

/// Force `file`'s data and metadata to stable storage.
///
/// On unix this is `fsync`; on Windows `FlushFileBuffers`. Other targets only
/// get `sync_data`, which may leave metadata such as the file length behind.
#[cfg(any(unix, windows))]
pub fn durable_flush(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Force `file`'s data to stable storage (metadata not guaranteed).
#[cfg(not(any(unix, windows)))]
pub fn durable_flush(file: &File) -> io::Result<()> {
    file.sync_data()
}
