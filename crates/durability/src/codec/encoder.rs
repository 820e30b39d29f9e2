//! Tick encoder for the tagged record family.
//!
//! # Record Layout
//!
//! ```text
//! ┌────────────┬─────────────┬──────────────┬──────────────────────────┐
//! │ Length (1) │ Version (1) │ Checksum (1) │ Fields (variable)        │
//! └────────────┴─────────────┴──────────────┴──────────────────────────┘
//! ```
//!
//! `Length` counts the whole record including itself. Fields carry the
//! difference between the tick and the encoder baseline; a zero difference
//! is not written at all.

use super::checksum::record_checksum;
use super::field::{put_sized, slot_field, Baseline, FieldId, SizeClass, DEPTH_SLOTS, OPTION_SLOTS};
use super::rules::FormatRules;
use tickstore_core::{
    Precision, StoreError, StoreResult, SymbolInfo, SymbolKey, Tick, MAX_RECORD_LEN,
};

/// Size of the fixed record prefix (length, version, checksum).
pub const RECORD_HEADER_LEN: usize = 3;

/// Largest possible field: tag, level byte and an eight-byte value.
const MAX_FIELD_LEN: usize = 10;

/// Encoder state that can be restored after a failed write.
#[derive(Debug, Clone, Copy)]
pub struct EncoderCheckpoint {
    baseline: Baseline,
    pending_reset: bool,
}

/// Stateful encoder for one symbol's tick stream.
///
/// Each encoded record is a delta against the previously encoded tick. The
/// caller decides where an independent chain starts by calling
/// [`TickEncoder::reset`]; the next record then carries a `Reset` field and
/// the stream precision so a decoder can start there.
#[derive(Debug, Clone)]
pub struct TickEncoder {
    symbol: SymbolKey,
    precision: Precision,
    rules: FormatRules,
    baseline: Baseline,
    pending_reset: bool,
}

impl TickEncoder {
    /// Encoder writing the current data version with the symbol's precision.
    pub fn new(symbol: &SymbolInfo) -> StoreResult<Self> {
        Ok(Self::with_precision(symbol.key, symbol.precision()?))
    }

    /// Encoder with an explicit precision.
    pub fn with_precision(symbol: SymbolKey, precision: Precision) -> Self {
        TickEncoder {
            symbol,
            precision,
            rules: FormatRules::current(),
            baseline: Baseline::ZERO,
            pending_reset: true,
        }
    }

    /// Write an older tagged version (8-10) instead of the current one.
    pub fn with_version(mut self, version: u8) -> StoreResult<Self> {
        self.rules = FormatRules::for_version(version).ok_or(StoreError::UnsupportedVersion {
            version,
            offset: 0,
        })?;
        Ok(self)
    }

    /// Symbol this encoder writes
    pub fn symbol(&self) -> SymbolKey {
        self.symbol
    }

    /// Data version of the records produced
    pub fn data_version(&self) -> u8 {
        self.rules.version
    }

    /// Precision applied to prices in the records written.
    ///
    /// Versions without a precision field always store full resolution.
    pub fn effective_precision(&self) -> Precision {
        if self.rules.reset_and_precision {
            self.precision
        } else {
            Precision::FULL
        }
    }

    /// Start a new independent delta chain with the next record.
    ///
    /// Versions 8 and 9 have no reset field; a reset there is only valid at
    /// the start of a stream.
    pub fn reset(&mut self) {
        self.baseline = Baseline::ZERO;
        self.pending_reset = true;
    }

    /// Capture the state needed to undo subsequent encodes
    pub fn checkpoint(&self) -> EncoderCheckpoint {
        EncoderCheckpoint {
            baseline: self.baseline,
            pending_reset: self.pending_reset,
        }
    }

    /// Undo every encode performed after `checkpoint` was taken
    pub fn restore(&mut self, checkpoint: EncoderCheckpoint) {
        self.baseline = checkpoint.baseline;
        self.pending_reset = checkpoint.pending_reset;
    }

    /// Append one record for `tick` to `out`, returning the bytes written.
    ///
    /// On error nothing is appended and the baseline is unchanged.
    pub fn encode(&mut self, tick: &Tick, out: &mut Vec<u8>) -> StoreResult<usize> {
        let precision = self.effective_precision();
        let current = Baseline::from_tick(&tick.clone().normalized(), &precision);
        let write_reset = self.pending_reset && self.rules.reset_and_precision;

        let reference = self.reference();

        let start = out.len();
        let mut record = [0u8; RECORD_HEADER_LEN + 2 * MAX_FIELD_LEN + 32 * MAX_FIELD_LEN];
        let mut pos = RECORD_HEADER_LEN;

        if write_reset {
            record[pos] = FieldId::Reset.tag(SizeClass::One);
            pos += 1;
            pos = put_field(&mut record, pos, FieldId::Precision, None, precision.factor());
        }

        if current.content != reference.content {
            pos = put_field(
                &mut record,
                pos,
                FieldId::ContentMask,
                None,
                current.content as i64,
            );
        }

        for slot in current.present_slots() {
            let diff = current.values[slot].wrapping_sub(reference.values[slot]);
            if diff == 0 {
                continue;
            }
            let (field, level) = slot_field(slot);
            pos = put_field(&mut record, pos, field, level, diff);
        }

        if pos > MAX_RECORD_LEN {
            return Err(StoreError::invalid_record(
                start as u64,
                format!("encoded record is {} bytes, limit is {}", pos, MAX_RECORD_LEN),
            ));
        }

        record[0] = pos as u8;
        record[1] = self.rules.version;
        record[2] = record_checksum(&current);
        out.extend_from_slice(&record[..pos]);

        if self.rules.running_baseline {
            self.baseline.absorb(&current);
        }
        self.pending_reset = false;
        Ok(pos)
    }

    /// Baseline the next record is differenced against.
    fn reference(&self) -> Baseline {
        if !self.rules.running_baseline || self.pending_reset {
            return Baseline::ZERO;
        }
        let mut reference = self.baseline;
        if !self.rules.delta_options {
            reference.values[OPTION_SLOTS].fill(0);
        }
        if !self.rules.delta_depth {
            reference.values[DEPTH_SLOTS].fill(0);
        }
        reference
    }
}

fn put_field(buf: &mut [u8], pos: usize, field: FieldId, level: Option<u8>, value: i64) -> usize {
    let size = SizeClass::for_value(value);
    let mut pos = pos;
    buf[pos] = field.tag(size);
    pos += 1;
    if let Some(level) = level {
        buf[pos] = level;
        pos += 1;
    }
    put_sized(buf, pos, size, value);
    pos + size.width()
}
