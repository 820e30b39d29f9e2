//! Blocked tick file.
//!
//! A file header block followed by tick blocks of the same size. Each block
//! starts a fresh delta chain, so any block decodes on its own and blocks
//! before a requested start time can be skipped by header alone.

use super::tick_block::TickBlock;
use crate::codec::{TickDecoder, TickEncoder};
use crate::format::{
    BlockHeader, FileHeader, BLOCK_HEADER_SIZE, FILE_HEADER_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};
use crate::pipeline::{BlockSink, FileSink, PipelineStats, WritePipeline};
use crate::stream::{ReadFilter, TickFileOptions, TickStream};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tickstore_core::{StoreError, StoreResult, SymbolInfo, SymbolKey, Tick, Timestamp};
use tracing::{debug, info};

struct Writer {
    pipeline: WritePipeline,
    encoder: TickEncoder,
    block: Option<TickBlock>,
}

struct Reader {
    file: File,
    decoder: TickDecoder,
    block: Option<TickBlock>,
    block_position: u64,
    spare: Vec<u8>,
    returned: u64,
    done: bool,
}

/// Tick file made of fixed-size blocks.
pub struct BlockTickFile {
    path: PathBuf,
    name: String,
    symbol: SymbolKey,
    header: FileHeader,
    filter: ReadFilter,
    /// File length (read side) or bytes handed to the writer (write side)
    length: u64,
    writer: Option<Writer>,
    reader: Option<Reader>,
    last_tick: Option<Tick>,
}

impl BlockTickFile {
    /// Open an existing blocked file for reading.
    ///
    /// A file that is not in the blocked format fails with
    /// [`StoreError::StructuralValidation`].
    pub fn open_read(path: &Path, symbol: SymbolKey, filter: ReadFilter) -> StoreResult<Self> {
        let mut file = open_existing(path)?;
        let length = file.metadata()?.len();
        let header = read_file_header(&mut file, path, length)?;
        info!(
            target: "tickstore::block",
            path = %path.display(),
            block_size = header.block_size(),
            blocks = length / header.block_size() as u64 - 1,
            "Opened blocked tick file"
        );

        Ok(BlockTickFile {
            path: path.to_path_buf(),
            name: file_name(path),
            symbol,
            header,
            filter,
            length,
            writer: None,
            reader: Some(Reader {
                file,
                decoder: TickDecoder::new(symbol),
                block: None,
                block_position: header.block_size() as u64,
                spare: Vec::new(),
                returned: 0,
                done: false,
            }),
            last_tick: None,
        })
    }

    /// Create (or truncate) a blocked file and write its header.
    pub fn create(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Self> {
        validate_block_size(options.block_size)?;
        let header = FileHeader::new(options.block_size, Timestamp::now());
        let sink = FileSink::create(path)?;
        let pipeline = WritePipeline::start(Box::new(sink), options.retry_delay, options.block_size)?;
        pipeline.submit(header.to_block())?;
        info!(
            target: "tickstore::block",
            path = %path.display(),
            block_size = options.block_size,
            "Created blocked tick file"
        );
        Self::writer(path, symbol, header, pipeline, header.block_size() as u64)
    }

    /// Open an existing blocked file and append new blocks after its end.
    ///
    /// The header is validated first; a file that is not blocked fails with
    /// [`StoreError::StructuralValidation`] before anything is written.
    pub fn append(path: &Path, symbol: &SymbolInfo, options: &TickFileOptions) -> StoreResult<Self> {
        let header = {
            let mut file = open_existing(path)?;
            let length = file.metadata()?.len();
            read_file_header(&mut file, path, length)?
        };
        let sink = FileSink::append(path)?;
        let length = sink.committed_len();
        let pipeline = WritePipeline::start(Box::new(sink), options.retry_delay, header.block_size())?;
        info!(
            target: "tickstore::block",
            path = %path.display(),
            length,
            "Appending to blocked tick file"
        );
        Self::writer(path, symbol, header, pipeline, length)
    }

    fn writer(
        path: &Path,
        symbol: &SymbolInfo,
        header: FileHeader,
        pipeline: WritePipeline,
        length: u64,
    ) -> StoreResult<Self> {
        Ok(BlockTickFile {
            path: path.to_path_buf(),
            name: file_name(path),
            symbol: symbol.key,
            header,
            filter: ReadFilter::all(),
            length,
            writer: Some(Writer {
                pipeline,
                encoder: TickEncoder::new(symbol)?,
                block: None,
            }),
            reader: None,
            last_tick: None,
        })
    }

    /// File header
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Block size of the file
    pub fn block_size(&self) -> usize {
        self.header.block_size()
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

    /// Finish the current block and queue it.
    fn submit_block(&mut self) -> StoreResult<()> {
        let block_size = self.header.block_size();
        let writer = self.write_mode_only()?;
        let Some(block) = writer.block.take() else {
            return Ok(());
        };
        if block.is_empty() {
            let mut buf = block.into_buffer();
            buf.clear();
            writer.pipeline.submit(buf)?;
            return Ok(());
        }
        debug!(
            target: "tickstore::block",
            records = block.records(),
            used = block.used(),
            "Block complete"
        );
        writer.pipeline.submit(block.finish())?;
        self.length += block_size as u64;
        Ok(())
    }

    fn next_block(&mut self) -> StoreResult<bool> {
        let block_size = self.header.block_size();
        let filter = self.filter;
        let name = self.name.clone();
        let length = self.length;
        let Some(reader) = self.reader.as_mut() else {
            return Err(StoreError::InvalidOperation("file is open for writing".to_string()));
        };

        loop {
            if reader.block_position + block_size as u64 > length {
                return Ok(false);
            }
            let position = reader.block_position;
            let mut buf = std::mem::take(&mut reader.spare);
            buf.resize(block_size, 0);
            reader.file.seek(SeekFrom::Start(position))?;
            let got = read_full(&mut reader.file, &mut buf)?;
            if got < block_size {
                return Err(StoreError::invalid_record(
                    position,
                    format!("block truncated to {} of {} bytes", got, block_size),
                ));
            }
            reader.block_position += block_size as u64;

            let (block, header) =
                TickBlock::load(buf, block_size, position).map_err(|e| e.in_file(&name))?;
            if header.is_empty() || filter.is_before(header.last_time) {
                reader.spare = block.into_buffer();
                continue;
            }
            reader.decoder.reset();
            reader.block = Some(block);
            return Ok(true);
        }
    }
}

impl TickStream for BlockTickFile {
    fn try_write_tick(&mut self, tick: &Tick) -> StoreResult<bool> {
        let block_size = self.header.block_size();
        let writer = self.write_mode_only()?;
        if writer.block.is_none() {
            writer.encoder.reset();
            writer.block = Some(TickBlock::new(writer.pipeline.take_buffer(), block_size));
        }
        let fitted = match writer.block.as_mut() {
            Some(block) => block.try_write_tick(&mut writer.encoder, tick)?,
            None => false,
        };

        if !fitted {
            self.submit_block()?;
            let writer = self.write_mode_only()?;
            writer.encoder.reset();
            let mut block = TickBlock::new(writer.pipeline.take_buffer(), block_size);
            if !block.try_write_tick(&mut writer.encoder, tick)? {
                return Err(StoreError::invalid_record(
                    0,
                    format!("record does not fit an empty {} byte block", block_size),
                ));
            }
            writer.block = Some(block);
        }
        self.last_tick = Some(tick.clone());
        Ok(true)
    }

    fn try_read_tick(&mut self) -> StoreResult<Option<Tick>> {
        let filter = self.filter;
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Err(StoreError::InvalidOperation("file is open for writing".to_string()));
            };
            if reader.done || filter.is_exhausted(reader.returned) {
                return Ok(None);
            }

            if reader.block.is_none() {
                if !self.next_block()? {
                    if let Some(reader) = self.reader.as_mut() {
                        reader.done = true;
                    }
                    return Ok(None);
                }
                continue;
            }

            let position = reader.block_position - self.header.block_size() as u64;
            let next = match reader.block.as_mut() {
                Some(block) => block
                    .try_read_tick(&mut reader.decoder, position)
                    .map_err(|e| e.in_file(&self.name))?,
                None => None,
            };
            let Some(tick) = next else {
                if let Some(block) = reader.block.take() {
                    reader.spare = block.into_buffer();
                }
                continue;
            };

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
        self.submit_block()?;
        self.write_mode_only()?.pipeline.flush()
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.writer.is_some() {
            self.submit_block()?;
        }
        if let Some(writer) = self.writer.take() {
            writer.pipeline.close()?;
            info!(
                target: "tickstore::block",
                path = %self.path.display(),
                length = self.length,
                "Closed blocked tick file"
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
            (Some(reader), _) => match &reader.block {
                Some(block) => {
                    reader.block_position - self.header.block_size() as u64 + block.read_pos() as u64
                }
                None => reader.block_position,
            },
            (None, Some(writer)) => {
                self.length + writer.block.as_ref().map_or(0, |b| b.used() as u64)
            }
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

impl Drop for BlockTickFile {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.close() {
                tracing::error!(
                    target: "tickstore::block",
                    path = %self.path.display(),
                    error = %e,
                    "Close on drop failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for BlockTickFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockTickFile")
            .field("path", &self.path)
            .field("symbol", &self.symbol)
            .field("block_size", &self.header.block_size)
            .field("length", &self.length)
            .field("writing", &self.writer.is_some())
            .finish()
    }
}

/// Header summary of one block, from [`scan_blocks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    /// Zero-based index of the tick block
    pub index: usize,
    /// File offset of the block
    pub position: u64,
    /// Parsed header
    pub header: BlockHeader,
    /// True if every byte after the payload is zero
    pub padding_zeroed: bool,
}

/// Verify a blocked file and summarize every tick block.
///
/// Fails on the first header that does not verify.
pub fn scan_blocks(path: &Path) -> StoreResult<(FileHeader, Vec<BlockSummary>)> {
    let mut file = open_existing(path)?;
    let length = file.metadata()?.len();
    let header = read_file_header(&mut file, path, length)?;
    let block_size = header.block_size();
    let name = file_name(path);

    let mut summaries = Vec::new();
    let mut buf = vec![0u8; block_size];
    let mut position = block_size as u64;
    file.seek(SeekFrom::Start(position))?;
    while position < length {
        let got = read_full(&mut file, &mut buf)?;
        if got < block_size {
            return Err(StoreError::invalid_record(position, "truncated block"));
        }
        let block_header =
            BlockHeader::parse(&buf, block_size, position).map_err(|e| e.in_file(&name))?;
        let payload_end = (block_header.payload_len as usize).max(BLOCK_HEADER_SIZE);
        summaries.push(BlockSummary {
            index: summaries.len(),
            position,
            header: block_header,
            padding_zeroed: buf[payload_end..].iter().all(|b| *b == 0),
        });
        position += block_size as u64;
    }
    Ok((header, summaries))
}

fn validate_block_size(block_size: usize) -> StoreResult<()> {
    if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(StoreError::Config(format!(
            "block size {} outside {}..={}",
            block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
        )));
    }
    Ok(())
}

fn open_existing(path: &Path) -> StoreResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StoreError::FileNotFound(path.to_path_buf()),
        _ => StoreError::Io(e),
    })
}

fn read_file_header(file: &mut File, path: &Path, length: u64) -> StoreResult<FileHeader> {
    let mut bytes = [0u8; FILE_HEADER_SIZE];
    file.seek(SeekFrom::Start(0))?;
    let got = read_full(file, &mut bytes)?;
    FileHeader::parse(&bytes[..got], length).map_err(|e| e.in_file(&file_name(path)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read until `buf` is full or the file ends; returns the bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
