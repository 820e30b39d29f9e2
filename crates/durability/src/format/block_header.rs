//! Tick block header.
//!
//! # Binary Format (32 bytes, little-endian)
//!
//! ```text
//! ┌─────────────┬─────────────┬─────────────────┬───────────────┬──────────────┬──────────────┐
//! │ Version (2) │ Type = 2 (2)│ Payload Len (4) │ First UTC (8) │ Last UTC (8) │ Checksum (8) │
//! └─────────────┴─────────────┴─────────────────┴───────────────┴──────────────┴──────────────┘
//! ```
//!
//! `Payload Len` is measured from the start of the block, so it includes the
//! header. Records run from byte 32 to `Payload Len`; the rest of the block
//! is zero. The checksum is the XOR of the five preceding fields.

use byteorder::{ByteOrder, LittleEndian};
use tickstore_core::{StoreError, StoreResult, Timestamp};

/// Current tick block header version
pub const BLOCK_HEADER_VERSION: i16 = 1;

/// Block type tag of a tick block
pub const TICK_BLOCK_TYPE: i16 = 2;

/// Serialized size of the block header
pub const BLOCK_HEADER_SIZE: usize = 32;

/// Header of one tick block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Header format version
    pub version: i16,
    /// Block type tag, always [`TICK_BLOCK_TYPE`]
    pub block_type: i16,
    /// End of the records, counted from the block start
    pub payload_len: i32,
    /// Time of the first tick in the block
    pub first_time: Timestamp,
    /// Time of the last tick in the block
    pub last_time: Timestamp,
}

impl BlockHeader {
    /// Header of an empty block
    pub fn empty() -> Self {
        BlockHeader {
            version: BLOCK_HEADER_VERSION,
            block_type: TICK_BLOCK_TYPE,
            payload_len: BLOCK_HEADER_SIZE as i32,
            first_time: Timestamp::MIN,
            last_time: Timestamp::MIN,
        }
    }

    /// XOR of the header fields
    pub fn checksum(&self) -> i64 {
        self.version as i64
            ^ self.block_type as i64
            ^ self.payload_len as i64
            ^ self.first_time.ticks()
            ^ self.last_time.ticks()
    }

    /// True if the block holds no records
    pub fn is_empty(&self) -> bool {
        self.payload_len as usize <= BLOCK_HEADER_SIZE
    }

    /// Serialize into the first 32 bytes of `buf`.
    pub fn write_to(&self, buf: &mut [u8]) {
        LittleEndian::write_i16(&mut buf[0..2], self.version);
        LittleEndian::write_i16(&mut buf[2..4], self.block_type);
        LittleEndian::write_i32(&mut buf[4..8], self.payload_len);
        LittleEndian::write_i64(&mut buf[8..16], self.first_time.ticks());
        LittleEndian::write_i64(&mut buf[16..24], self.last_time.ticks());
        LittleEndian::write_i64(&mut buf[24..32], self.checksum());
    }

    /// Parse and verify the header at the start of a block.
    ///
    /// `position` is the file offset of the block. A checksum mismatch, a
    /// foreign type tag or an impossible payload length is corruption.
    pub fn parse(block: &[u8], block_size: usize, position: u64) -> StoreResult<Self> {
        if block.len() < BLOCK_HEADER_SIZE {
            return Err(StoreError::invalid_record(
                position,
                format!("block header truncated to {} bytes", block.len()),
            ));
        }
        let raw = &block[..BLOCK_HEADER_SIZE];
        let header = BlockHeader {
            version: LittleEndian::read_i16(&raw[0..2]),
            block_type: LittleEndian::read_i16(&raw[2..4]),
            payload_len: LittleEndian::read_i32(&raw[4..8]),
            first_time: Timestamp::from_ticks(LittleEndian::read_i64(&raw[8..16])),
            last_time: Timestamp::from_ticks(LittleEndian::read_i64(&raw[16..24])),
        };
        let stored = LittleEndian::read_i64(&raw[24..32]);

        if stored != header.checksum() {
            return Err(StoreError::corruption(
                "",
                position,
                stored,
                header.checksum(),
                format!("block header {}", hex(raw)),
            ));
        }
        if header.version != BLOCK_HEADER_VERSION || header.block_type != TICK_BLOCK_TYPE {
            return Err(StoreError::corruption(
                "",
                position,
                stored,
                header.checksum(),
                format!(
                    "block version {} type {} is not a tick block: {}",
                    header.version,
                    header.block_type,
                    hex(raw)
                ),
            ));
        }
        let payload = header.payload_len as i64;
        if payload < BLOCK_HEADER_SIZE as i64 || payload > block_size as i64 {
            return Err(StoreError::invalid_record(
                position,
                format!("payload length {} outside block of {} bytes", payload, block_size),
            ));
        }
        Ok(header)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
