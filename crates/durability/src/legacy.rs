//! Legacy tick stream
//!
//! The format used before blocks existed: one continuous chain of records
//! with no header, no padding and no block boundaries. Records are framed as
//! described in [`crate::codec::decoder`] and run until the end of the file.
//!
//! Reading loads the whole file (optionally through a [`FileCache`]) and
//! decodes from memory. Writing produces current-version records with a
//! single Reset and Precision at the start of each writing session.

use crate::cache::FileCache;
use crate::codec::{TickDecoder, TickEncoder, FIRST_TAGGED_VERSION};
use crate::pipeline::{BlockSink, FileSink, PipelineStats, WritePipeline};
use crate::stream::{ReadFilter, TickFileOptions, TickStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tickstore_core::{StoreError, StoreResult, SymbolInfo, SymbolKey, Tick};
use tracing::{debug, info};

struct Writer {
    pipeline: WritePipeline,
    encoder: TickEncoder,
    buffer: Vec<u8>,
    flush_threshold: usize,
    cache: Option<Arc<FileCache>>,
}

struct Reader {
    data: Arc<[u8]>,
    decoder: TickDecoder,
    offset: usize,
    returned: u64,
    done: bool,
}

/// Tick file in the unblocked legacy format.
pub struct LegacyTickFile {
    path: PathBuf,
    name: String,
    symbol: SymbolKey,
    filter: ReadFilter,
    /// File length (read side) or bytes handed to the writer (write side)
    length: u64,
    writer: Option<Writer>,
    reader: Option<Reader>,
    last_tick: Option<Tick>,
}

impl LegacyTickFile {
    /// Open a legacy file for reading.
    pub fn open_read(
        path: &Path,
        symbol: SymbolKey,
        filter: ReadFilter,
        cache: Option<&FileCache>,
    ) -> StoreResult<Self> {
        let data: Arc<[u8]> = match cache {
            Some(cache) => cache.get_or_load(symbol, path)?,
            None => match std::fs::read(path) {
                Ok(bytes) => bytes.into(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StoreError::FileNotFound(path.to_path_buf()))
                }
                Err(e) => return Err(e.into()),
            },
        };
        info!(
            target: "tickstore::legacy",
            path = %path.display(),
            bytes = data.len(),
            "Opened legacy tick file"
        );
        Ok(LegacyTickFile {
            path: path.to_path_buf(),
            name: file_name(path),
            symbol,
            filter,
            length: data.len() as u64,
            writer: None,
            reader: Some(Reader {
                data,
                decoder: TickDecoder::new(symbol),
                offset: 0,
                returned: 0,
                done: false,
            }),
            last_tick: None,
        })
    }

    /// Create (or truncate) a legacy file.
    pub fn create(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Self> {
        let sink = FileSink::create(path)?;
        info!(target: "tickstore::legacy", path = %path.display(), "Created legacy tick file");
        Self::writer(path, symbol, options, sink)
    }

    /// Append to an existing legacy file.
    ///
    /// Streams in the fixed layouts (versions 1-7) cannot be extended: the
    /// framing of a stream is fixed by its first record.
    pub fn append(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Self> {
        let mut first = [0u8; 1];
        {
            use std::io::Read;
            let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::FileNotFound(path.to_path_buf()),
                _ => StoreError::Io(e),
            })?;
            let got = file.read(&mut first)?;
            if got == 1 && first[0] < FIRST_TAGGED_VERSION {
                return Err(StoreError::InvalidOperation(format!(
                    "{} holds version {} fixed records and cannot be appended to",
                    path.display(),
                    first[0]
                )));
            }
        }
        let sink = FileSink::append(path)?;
        info!(
            target: "tickstore::legacy",
            path = %path.display(),
            length = sink.committed_len(),
            "Appending to legacy tick file"
        );
        Self::writer(path, symbol, options, sink)
    }

    fn writer(
        path: &Path,
        symbol: &SymbolInfo,
        options: &TickFileOptions,
        sink: FileSink,
    ) -> StoreResult<Self> {
        let length = sink.committed_len();
        let capacity = options.legacy_flush_threshold.saturating_mul(2);
        let pipeline = WritePipeline::start(Box::new(sink), options.retry_delay, capacity)?;
        let buffer = pipeline.take_buffer();
        if let Some(cache) = &options.cache {
            cache.invalidate(symbol.key);
        }
        Ok(LegacyTickFile {
            path: path.to_path_buf(),
            name: file_name(path),
            symbol: symbol.key,
            filter: ReadFilter::all(),
            length,
            writer: Some(Writer {
                pipeline,
                encoder: TickEncoder::new(symbol)?,
                buffer,
                flush_threshold: options.legacy_flush_threshold,
                cache: options.cache.clone(),
            }),
            reader: None,
            last_tick: None,
        })
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Symbol of the file
    pub fn symbol(&self) -> SymbolKey {
        self.symbol
    }

    /// Writer counters, `None` in read mode
    pub fn pipeline_stats(&self) -> Option<PipelineStats> {
        self.writer.as_ref().map(|w| w.pipeline.stats())
    }

    fn write_mode_only(&mut self) -> StoreResult<&mut Writer> {
        self.writer
            .as_mut()
            .ok_or_else(|| StoreError::InvalidOperation("file is open for reading".to_string()))
    }

    /// Hand the write buffer to the pipeline and take a fresh one.
    fn hand_off(&mut self) -> StoreResult<()> {
        let writer = self.write_mode_only()?;
        if writer.buffer.is_empty() {
            return Ok(());
        }
        let fresh = writer.pipeline.take_buffer();
        let full = std::mem::replace(&mut writer.buffer, fresh);
        let bytes = full.len() as u64;
        debug!(target: "tickstore::legacy", bytes, "Handing buffer to writer");
        writer.pipeline.submit(full)?;
        self.length += bytes;
        Ok(())
    }
}

impl TickStream for LegacyTickFile {
    fn try_write_tick(&mut self, tick: &Tick) -> StoreResult<bool> {
        let writer = self.write_mode_only()?;
        writer.encoder.encode(tick, &mut writer.buffer)?;
        let full = writer.buffer.len() > writer.flush_threshold;
        if full {
            self.hand_off()?;
        }
        self.last_tick = Some(tick.clone());
        Ok(true)
    }

    fn try_read_tick(&mut self) -> StoreResult<Option<Tick>> {
        let filter = self.filter;
        let Some(reader) = self.reader.as_mut() else {
            return Err(StoreError::InvalidOperation("file is open for writing".to_string()));
        };
        loop {
            if reader.done || filter.is_exhausted(reader.returned) || reader.offset >= reader.data.len() {
                return Ok(None);
            }
            let record = reader
                .decoder
                .decode(&reader.data[reader.offset..], reader.offset as u64)
                .map_err(|e| e.in_file(&self.name))?;
            reader.offset += record.consumed;

            let tick = record.tick;
            if filter.is_before(tick.utc_time) {
                continue;
            }
            if filter.is_after(tick.utc_time) {
                reader.done = true;
                return Ok(None);
            }
            reader.returned += 1;
            self.last_tick = Some(tick.clone());
            return Ok(Some(tick));
        }
    }

    fn last_tick(&self) -> Option<&Tick> {
        self.last_tick.as_ref()
    }

    fn flush(&mut self) -> StoreResult<()> {
        if self.writer.is_none() {
            return Ok(());
        }
        self.hand_off()?;
        let symbol = self.symbol;
        let writer = self.write_mode_only()?;
        writer.pipeline.flush()?;
        if let Some(cache) = &writer.cache {
            cache.invalidate(symbol);
        }
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.writer.is_some() {
            self.hand_off()?;
        }
        if let Some(writer) = self.writer.take() {
            writer.pipeline.close()?;
            if let Some(cache) = &writer.cache {
                cache.invalidate(self.symbol);
            }
            info!(
                target: "tickstore::legacy",
                path = %self.path.display(),
                length = self.length,
                "Closed legacy tick file"
            );
        }
        self.reader = None;
        Ok(())
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn position(&self) -> u64 {
        match (&self.reader, &self.writer) {
            (Some(reader), _) => reader.offset as u64,
            (None, Some(writer)) => self.length + writer.buffer.len() as u64,
            (None, None) => self.length,
        }
    }

    fn data_version(&self) -> Option<u8> {
        match (&self.reader, &self.writer) {
            (Some(reader), _) => reader.decoder.data_version(),
            (None, Some(writer)) => Some(writer.encoder.data_version()),
            (None, None) => None,
        }
    }
}

impl Drop for LegacyTickFile {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.close() {
                tracing::error!(
                    target: "tickstore::legacy",
                    path = %self.path.display(),
                    error = %e,
                    "Close on drop failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for LegacyTickFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyTickFile")
            .field("path", &self.path)
            .field("symbol", &self.symbol)
            .field("length", &self.length)
            .field("writing", &self.writer.is_some())
            .finish()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
