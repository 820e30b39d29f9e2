//! One fixed-size block of tick records.

use crate::codec::{TickDecoder, TickEncoder};
use crate::format::{BlockHeader, BLOCK_HEADER_SIZE};
use tickstore_core::{StoreResult, Tick, Timestamp};

/// A block being filled or read.
///
/// While writing, the buffer length is the write offset; the header space is
/// reserved up front and written by [`TickBlock::finish`].
#[derive(Debug)]
pub struct TickBlock {
    buf: Vec<u8>,
    block_size: usize,
    first_time: Option<Timestamp>,
    last_time: Timestamp,
    records: usize,
    /// Read cursor and end of records (read side only)
    read_pos: usize,
    payload_len: usize,
}

impl TickBlock {
    /// Start an empty block in `buf`, which is cleared first.
    pub fn new(mut buf: Vec<u8>, block_size: usize) -> Self {
        buf.clear();
        buf.reserve(block_size);
        buf.resize(BLOCK_HEADER_SIZE, 0);
        TickBlock {
            buf,
            block_size,
            first_time: None,
            last_time: Timestamp::MIN,
            records: 0,
            read_pos: BLOCK_HEADER_SIZE,
            payload_len: BLOCK_HEADER_SIZE,
        }
    }

    /// Append one record. Returns `false`, leaving block and encoder as they
    /// were, when the record does not fit.
    pub fn try_write_tick(&mut self, encoder: &mut TickEncoder, tick: &Tick) -> StoreResult<bool> {
        let checkpoint = encoder.checkpoint();
        let start = self.buf.len();
        encoder.encode(tick, &mut self.buf)?;
        if self.buf.len() > self.block_size {
            self.buf.truncate(start);
            encoder.restore(checkpoint);
            return Ok(false);
        }
        if self.first_time.is_none() {
            self.first_time = Some(tick.utc_time);
        }
        self.last_time = tick.utc_time;
        self.records += 1;
        Ok(true)
    }

    /// Number of records written
    pub fn records(&self) -> usize {
        self.records
    }

    /// True if nothing was written
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Bytes used including the header
    pub fn used(&self) -> usize {
        self.buf.len()
    }

    /// Header describing the records written so far
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            payload_len: self.buf.len() as i32,
            first_time: self.first_time.unwrap_or(Timestamp::MIN),
            last_time: self.last_time,
            ..BlockHeader::empty()
        }
    }

    /// Write the header into the reserved space.
    pub fn write_header(&mut self) {
        let header = self.header();
        header.write_to(&mut self.buf[..BLOCK_HEADER_SIZE]);
    }

    /// Write the header, zero-pad to the block size and hand out the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.write_header();
        self.buf.resize(self.block_size, 0);
        self.buf
    }

    /// Take over a block read from disk, verifying its header.
    ///
    /// `position` is the block's file offset, used in errors.
    pub fn load(buf: Vec<u8>, block_size: usize, position: u64) -> StoreResult<(Self, BlockHeader)> {
        let header = BlockHeader::parse(&buf, block_size, position)?;
        let block = TickBlock {
            buf,
            block_size,
            first_time: Some(header.first_time),
            last_time: header.last_time,
            records: 0,
            read_pos: BLOCK_HEADER_SIZE,
            payload_len: header.payload_len as usize,
        };
        Ok((block, header))
    }

    /// Decode the next record, `None` at the end of the payload.
    pub fn try_read_tick(&mut self, decoder: &mut TickDecoder, position: u64) -> StoreResult<Option<Tick>> {
        if self.read_pos >= self.payload_len {
            return Ok(None);
        }
        let record = decoder.decode(
            &self.buf[self.read_pos..self.payload_len],
            position + self.read_pos as u64,
        )?;
        self.read_pos += record.consumed;
        self.records += 1;
        Ok(Some(record.tick))
    }

    /// Offset of the next record within the block
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Give the buffer back for reuse
    pub fn into_buffer(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickstore_core::{Price, SymbolInfo, SymbolKey};

    fn tick(i: i64) -> Tick {
        Tick::builder(SymbolKey(1), Timestamp::from_ticks(1_000_000 + i * 7))
            .quote(Price::from_f64(100.0 + i as f64 * 0.01), Price::from_f64(100.5 + i as f64 * 0.01))
            .build()
    }

    #[test]
    fn test_fill_until_full_and_read_back() {
        let mut encoder = TickEncoder::new(&SymbolInfo::new(1, "ES", 0.01)).unwrap();
        let mut block = TickBlock::new(Vec::new(), 256);
        let mut written = Vec::new();
        for i in 0.. {
            let t = tick(i);
            if !block.try_write_tick(&mut encoder, &t).unwrap() {
                break;
            }
            written.push(t);
        }
        assert!(!written.is_empty());
        assert!(block.used() <= 256);
        let header = block.header();
        assert_eq!(header.first_time, written[0].utc_time);
        assert_eq!(header.last_time, written.last().unwrap().utc_time);

        let bytes = block.finish();
        assert_eq!(bytes.len(), 256);
        assert!(bytes[header.payload_len as usize..].iter().all(|b| *b == 0));

        let (mut loaded, _) = TickBlock::load(bytes, 256, 0).unwrap();
        let mut decoder = TickDecoder::new(SymbolKey(1));
        let mut read = Vec::new();
        while let Some(t) = loaded.try_read_tick(&mut decoder, 0).unwrap() {
            read.push(t);
        }
        assert_eq!(read, written);
    }

    #[test]
    fn test_overflow_rolls_back_encoder() {
        let mut encoder = TickEncoder::new(&SymbolInfo::new(1, "ES", 0.01)).unwrap();
        let mut block = TickBlock::new(Vec::new(), 256);
        while block.try_write_tick(&mut encoder, &tick(block.records() as i64)).unwrap() {}
        let used = block.used();
        let rejected = tick(10_000);
        assert!(!block.try_write_tick(&mut encoder, &rejected).unwrap());
        assert_eq!(block.used(), used);

        // The rejected tick starts the next block from a fresh chain
        encoder.reset();
        let mut next = TickBlock::new(Vec::new(), 256);
        assert!(next.try_write_tick(&mut encoder, &rejected).unwrap());
    }

    #[test]
    fn test_load_rejects_bad_checksum() {
        let mut encoder = TickEncoder::new(&SymbolInfo::new(1, "ES", 0.01)).unwrap();
        let mut block = TickBlock::new(Vec::new(), 256);
        block.try_write_tick(&mut encoder, &tick(0)).unwrap();
        let mut bytes = block.finish();
        bytes[12] ^= 0x10;
        assert!(TickBlock::load(bytes, 256, 1024).unwrap_err().is_corruption());
    }
}
