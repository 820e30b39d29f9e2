//! File header block of a blocked tick file.
//!
//! The first block of every blocked file holds only this header, zero padded
//! to the block size so that tick blocks start on block boundaries.
//!
//! # Binary Format (24 bytes, little-endian)
//!
//! ```text
//! ┌─────────────┬─────────────┬────────────────┬──────────────────┬──────────────┐
//! │ Version (2) │ Type = 1 (2)│ Block Size (4) │ Created UTC (8)  │ Checksum (8) │
//! └─────────────┴─────────────┴────────────────┴──────────────────┴──────────────┘
//! ```
//!
//! The checksum is the XOR of the four preceding fields widened to i64.

use byteorder::{ByteOrder, LittleEndian};
use tickstore_core::{StoreError, StoreResult, Timestamp};

/// Current file header version
pub const FILE_HEADER_VERSION: i16 = 1;

/// Block type tag of the file header
pub const FILE_HEADER_TYPE: i16 = 1;

/// Serialized size of the file header
pub const FILE_HEADER_SIZE: usize = 24;

/// Smallest accepted block size
pub const MIN_BLOCK_SIZE: usize = 256;

/// Largest accepted block size (16 MiB)
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Default block size
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Header of a blocked tick file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Header format version
    pub version: i16,
    /// Block type tag, always [`FILE_HEADER_TYPE`]
    pub block_type: i16,
    /// Size of every block in the file
    pub block_size: i32,
    /// When the file was created
    pub created: Timestamp,
}

impl FileHeader {
    /// Header for a new file.
    pub fn new(block_size: usize, created: Timestamp) -> Self {
        FileHeader {
            version: FILE_HEADER_VERSION,
            block_type: FILE_HEADER_TYPE,
            block_size: block_size as i32,
            created,
        }
    }

    /// Block size as a length
    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    /// XOR of the header fields.
    pub fn checksum(&self) -> i64 {
        self.version as i64 ^ self.block_type as i64 ^ self.block_size as i64 ^ self.created.ticks()
    }

    /// Serialize into a full zero-padded header block.
    pub fn to_block(&self) -> Vec<u8> {
        let mut block = vec![0u8; self.block_size()];
        self.write_to(&mut block[..FILE_HEADER_SIZE]);
        block
    }

    /// Serialize the 24 header bytes.
    pub fn write_to(&self, buf: &mut [u8]) {
        LittleEndian::write_i16(&mut buf[0..2], self.version);
        LittleEndian::write_i16(&mut buf[2..4], self.block_type);
        LittleEndian::write_i32(&mut buf[4..8], self.block_size);
        LittleEndian::write_i64(&mut buf[8..16], self.created.ticks());
        LittleEndian::write_i64(&mut buf[16..24], self.checksum());
    }

    /// Parse and validate a file header.
    ///
    /// A bad version, type or checksum is reported as
    /// [`StoreError::StructuralValidation`]: a file failing there is not a
    /// blocked file and may be read as a legacy stream instead. Once the
    /// header verifies, a length that is not a whole number of blocks is
    /// [`StoreError::Corruption`] at the start of the torn tail.
    pub fn parse(data: &[u8], file_len: u64) -> StoreResult<Self> {
        if data.len() < FILE_HEADER_SIZE {
            return Err(StoreError::StructuralValidation(format!(
                "file header needs {} bytes, found {}",
                FILE_HEADER_SIZE,
                data.len()
            )));
        }

        let header = FileHeader {
            version: LittleEndian::read_i16(&data[0..2]),
            block_type: LittleEndian::read_i16(&data[2..4]),
            block_size: LittleEndian::read_i32(&data[4..8]),
            created: Timestamp::from_ticks(LittleEndian::read_i64(&data[8..16])),
        };
        let stored = LittleEndian::read_i64(&data[16..24]);

        if header.version != FILE_HEADER_VERSION {
            return Err(StoreError::StructuralValidation(format!(
                "unsupported file header version {}",
                header.version
            )));
        }
        if header.block_type != FILE_HEADER_TYPE {
            return Err(StoreError::StructuralValidation(format!(
                "expected file header block type {}, found {}",
                FILE_HEADER_TYPE, header.block_type
            )));
        }
        if stored != header.checksum() {
            return Err(StoreError::StructuralValidation(format!(
                "file header checksum {:#x} does not match computed {:#x}",
                stored,
                header.checksum()
            )));
        }
        let block_size = header.block_size as i64;
        if block_size < MIN_BLOCK_SIZE as i64 || block_size > MAX_BLOCK_SIZE as i64 {
            return Err(StoreError::StructuralValidation(format!(
                "block size {} outside {}..={}",
                block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        let torn = file_len % block_size as u64;
        if torn != 0 {
            let tail = file_len - torn;
            return Err(StoreError::corruption(
                "",
                tail,
                tail as i64,
                file_len as i64,
                format!(
                    "file length {} is not a multiple of block size {}, {} byte torn tail",
                    file_len, block_size, torn
                ),
            ));
        }
        Ok(header)
    }
}
