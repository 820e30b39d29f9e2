//! Format selector
//!
//! [`TickFile`] opens a symbol's file in whichever format it is stored in.
//! Existing files are probed as blocked files first; a file whose header does
//! not validate is a legacy stream. A valid header over a torn tail is
//! corruption and never falls back. New files are created in the configured
//! format.

use crate::block::{scan_blocks, BlockSummary, BlockTickFile};
use crate::format::FileHeader;
use crate::legacy::LegacyTickFile;
use crate::pipeline::PipelineStats;
use crate::stream::{FileMode, StoreFormat, TickFileOptions, TickStream};
use std::path::Path;
use tickstore_core::{StoreError, StoreResult, SymbolInfo, Tick};
use tracing::{info, warn};

enum Inner {
    Blocked(BlockTickFile),
    Legacy(LegacyTickFile),
}

/// A tick file in either on-disk format.
pub struct TickFile {
    inner: Inner,
}

impl TickFile {
    /// Open `path` for `symbol` as described by `options.mode`.
    ///
    /// - `Read`: the file must exist; blocked and legacy files are both read.
    /// - `Write`: an existing file is appended to in its own format; a
    ///   missing one is created in `options.format`.
    /// - `Overwrite`: any existing file is removed and a new one created.
    pub fn open(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Self> {
        let inner = match options.mode {
            FileMode::Read => Self::open_read(path, symbol, options)?,
            FileMode::Write => Self::open_write(path, symbol, options)?,
            FileMode::Overwrite => {
                match std::fs::remove_file(path) {
                    Ok(()) => info!(target: "tickstore::selector", path = %path.display(), "Removed for overwrite"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Self::create(path, symbol, options)?
            }
        };
        Ok(TickFile { inner })
    }

    fn open_read(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Inner> {
        match BlockTickFile::open_read(path, symbol.key, options.filter) {
            Ok(file) => Ok(Inner::Blocked(file)),
            Err(e) if e.is_structural() => {
                info!(
                    target: "tickstore::selector",
                    path = %path.display(),
                    reason = %e,
                    "Not a blocked file, reading as legacy stream"
                );
                let file = LegacyTickFile::open_read(
                    path,
                    symbol.key,
                    options.filter,
                    options.cache.as_deref(),
                )?;
                Ok(Inner::Legacy(file))
            }
            Err(e) => Err(e),
        }
    }

    fn open_write(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Inner> {
        let existing_len = match std::fs::metadata(path) {
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        match existing_len {
            None => {
                warn!(
                    target: "tickstore::selector",
                    path = %path.display(),
                    format = ?options.format,
                    "Tick file missing, creating"
                );
                Self::create(path, symbol, options)
            }
            Some(0) => Self::create(path, symbol, options),
            Some(_) => match BlockTickFile::append(path, symbol, options) {
                Ok(file) => Ok(Inner::Blocked(file)),
                Err(e) if e.is_structural() => {
                    info!(
                        target: "tickstore::selector",
                        path = %path.display(),
                        reason = %e,
                        "Not a blocked file, appending as legacy stream"
                    );
                    Ok(Inner::Legacy(LegacyTickFile::append(path, symbol, options)?))
                }
                Err(e) => Err(e),
            },
        }
    }

    fn create(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Inner> {
        Ok(match options.format {
            StoreFormat::Blocked => Inner::Blocked(BlockTickFile::create(path, symbol, options)?),
            StoreFormat::Legacy => Inner::Legacy(LegacyTickFile::create(path, symbol, options)?),
        })
    }

    /// Check a blocked file's headers without decoding any record.
    pub fn verify(path: &Path) -> StoreResult<(FileHeader, Vec<BlockSummary>)> {
        scan_blocks(path)
    }

    /// True if the file is a legacy stream
    pub fn is_legacy(&self) -> bool {
        matches!(self.inner, Inner::Legacy(_))
    }

    /// Format of the opened file
    pub fn format(&self) -> StoreFormat {
        match self.inner {
            Inner::Blocked(_) => StoreFormat::Blocked,
            Inner::Legacy(_) => StoreFormat::Legacy,
        }
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        match &self.inner {
            Inner::Blocked(file) => file.path(),
            Inner::Legacy(file) => file.path(),
        }
    }

    /// Writer counters, `None` for a reader
    pub fn pipeline_stats(&self) -> Option<PipelineStats> {
        match &self.inner {
            Inner::Blocked(file) => file.pipeline_stats(),
            Inner::Legacy(file) => file.pipeline_stats(),
        }
    }

    fn stream(&self) -> &dyn TickStream {
        match &self.inner {
            Inner::Blocked(file) => file,
            Inner::Legacy(file) => file,
        }
    }

    fn stream_mut(&mut self) -> &mut dyn TickStream {
        match &mut self.inner {
            Inner::Blocked(file) => file,
            Inner::Legacy(file) => file,
        }
    }
}

impl TickStream for TickFile {
    fn try_write_tick(&mut self, tick: &Tick) -> StoreResult<bool> {
        self.stream_mut().try_write_tick(tick)
    }

    fn try_read_tick(&mut self) -> StoreResult<Option<Tick>> {
        self.stream_mut().try_read_tick()
    }

    fn last_tick(&self) -> Option<&Tick> {
        self.stream().last_tick()
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.stream_mut().flush()
    }

    fn close(&mut self) -> StoreResult<()> {
        self.stream_mut().close()
    }

    fn length(&self) -> u64 {
        self.stream().length()
    }

    fn position(&self) -> u64 {
        self.stream().position()
    }

    fn data_version(&self) -> Option<u8> {
        self.stream().data_version()
    }
}

impl std::fmt::Debug for TickFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Inner::Blocked(file) => f.debug_tuple("TickFile").field(file).finish(),
            Inner::Legacy(file) => f.debug_tuple("TickFile").field(file).finish(),
        }
    }
}

/// Read every tick of `path` into memory.
pub fn read_all(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Vec<Tick>> {
    if options.mode.is_write() {
        return Err(StoreError::InvalidOperation(
            "read_all requires read mode".to_string(),
        ));
    }
    let mut file = TickFile::open(path, symbol, options)?;
    let mut ticks = Vec::new();
    while let Some(tick) = file.try_read_tick()? {
        ticks.push(tick);
    }
    file.close()?;
    Ok(ticks)
}
