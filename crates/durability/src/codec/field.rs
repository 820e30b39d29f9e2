//! Field tags and the slot baseline shared by encoder and decoder.
//!
//! A tagged record is a sequence of fields:
//!
//! ```text
//! ┌──────────────────────────────┬───────────────────┬──────────────────┐
//! │ tag = (field_id << 3) | size │ level (depth only)│ value (1/2/4/8)  │
//! └──────────────────────────────┴───────────────────┴──────────────────┘
//! ```
//!
//! Values are little-endian signed integers in the narrowest of four widths
//! that holds them exactly. `Reset` is a bare tag with no value.

use byteorder::{ByteOrder, LittleEndian};
use tickstore_core::{
    ContentMask, OptionKind, Precision, StoreError, StoreResult, SymbolKey, Tick,
    Timestamp, TradeSide, DEPTH_LEVELS,
};

/// Field identifiers (upper five bits of a tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldId {
    /// Discard the delta baseline (no value)
    Reset = 1,
    /// Price precision factor of the stream
    Precision = 2,
    /// Content mask (absolute)
    ContentMask = 3,
    /// UTC time
    Time = 4,
    /// Best bid
    Bid = 5,
    /// Best ask
    Ask = 6,
    /// Trade side
    Side = 7,
    /// Trade price
    Price = 8,
    /// Trade size
    Size = 9,
    /// Option strike
    Strike = 10,
    /// Option expiration
    Expiration = 11,
    /// Option kind
    OptionKind = 12,
    /// Bid size at one depth level (followed by a level byte)
    BidDepth = 13,
    /// Ask size at one depth level (followed by a level byte)
    AskDepth = 14,
}

impl FieldId {
    /// Decode the upper five bits of a tag
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => FieldId::Reset,
            2 => FieldId::Precision,
            3 => FieldId::ContentMask,
            4 => FieldId::Time,
            5 => FieldId::Bid,
            6 => FieldId::Ask,
            7 => FieldId::Side,
            8 => FieldId::Price,
            9 => FieldId::Size,
            10 => FieldId::Strike,
            11 => FieldId::Expiration,
            12 => FieldId::OptionKind,
            13 => FieldId::BidDepth,
            14 => FieldId::AskDepth,
            _ => return None,
        })
    }

    /// Build a tag byte
    pub fn tag(self, size: SizeClass) -> u8 {
        ((self as u8) << 3) | size as u8
    }
}

/// Width of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SizeClass {
    /// One byte (i8)
    One = 0,
    /// Two bytes (i16)
    Two = 1,
    /// Four bytes (i32)
    Four = 2,
    /// Eight bytes (i64)
    Eight = 3,
}

impl SizeClass {
    /// Narrowest width that represents `value` exactly
    pub fn for_value(value: i64) -> Self {
        if (i8::MIN as i64..=i8::MAX as i64).contains(&value) {
            SizeClass::One
        } else if (i16::MIN as i64..=i16::MAX as i64).contains(&value) {
            SizeClass::Two
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
            SizeClass::Four
        } else {
            SizeClass::Eight
        }
    }

    /// Decode the lower three bits of a tag
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SizeClass::One),
            1 => Some(SizeClass::Two),
            2 => Some(SizeClass::Four),
            3 => Some(SizeClass::Eight),
            _ => None,
        }
    }

    /// Width in bytes
    pub fn width(self) -> usize {
        match self {
            SizeClass::One => 1,
            SizeClass::Two => 2,
            SizeClass::Four => 4,
            SizeClass::Eight => 8,
        }
    }
}

/// Write `value` at `buf[pos..]` in the given width. The caller guarantees room.
pub(crate) fn put_sized(buf: &mut [u8], pos: usize, size: SizeClass, value: i64) {
    match size {
        SizeClass::One => buf[pos] = value as i8 as u8,
        SizeClass::Two => LittleEndian::write_i16(&mut buf[pos..], value as i16),
        SizeClass::Four => LittleEndian::write_i32(&mut buf[pos..], value as i32),
        SizeClass::Eight => LittleEndian::write_i64(&mut buf[pos..], value),
    }
}

/// Read a value of the given width at `buf[*pos..]`, advancing `pos`.
pub(crate) fn take_sized(
    buf: &[u8],
    pos: &mut usize,
    size: SizeClass,
    offset: u64,
) -> StoreResult<i64> {
    let width = size.width();
    let bytes = buf.get(*pos..*pos + width).ok_or_else(|| {
        StoreError::invalid_record(offset, format!("field value truncated at byte {}", *pos))
    })?;
    let value = match size {
        SizeClass::One => bytes[0] as i8 as i64,
        SizeClass::Two => LittleEndian::read_i16(bytes) as i64,
        SizeClass::Four => LittleEndian::read_i32(bytes) as i64,
        SizeClass::Eight => LittleEndian::read_i64(bytes),
    };
    *pos += width;
    Ok(value)
}

// Slot layout of a baseline. Prices are held in symbol-scaled units.
pub(crate) const SLOT_TIME: usize = 0;
pub(crate) const SLOT_BID: usize = 1;
pub(crate) const SLOT_ASK: usize = 2;
pub(crate) const SLOT_SIDE: usize = 3;
pub(crate) const SLOT_PRICE: usize = 4;
pub(crate) const SLOT_SIZE: usize = 5;
pub(crate) const SLOT_STRIKE: usize = 6;
pub(crate) const SLOT_EXPIRATION: usize = 7;
pub(crate) const SLOT_OPTION_KIND: usize = 8;
pub(crate) const SLOT_BID_DEPTH: usize = 9;
pub(crate) const SLOT_ASK_DEPTH: usize = SLOT_BID_DEPTH + DEPTH_LEVELS;
pub(crate) const SLOTS: usize = SLOT_ASK_DEPTH + DEPTH_LEVELS;

pub(crate) const QUOTE_SLOTS: std::ops::Range<usize> = SLOT_BID..SLOT_SIDE;
pub(crate) const TRADE_SLOTS: std::ops::Range<usize> = SLOT_SIDE..SLOT_STRIKE;
pub(crate) const OPTION_SLOTS: std::ops::Range<usize> = SLOT_STRIKE..SLOT_BID_DEPTH;
pub(crate) const DEPTH_SLOTS: std::ops::Range<usize> = SLOT_BID_DEPTH..SLOTS;

/// Field id and depth level stored in a slot.
pub(crate) fn slot_field(slot: usize) -> (FieldId, Option<u8>) {
    match slot {
        SLOT_TIME => (FieldId::Time, None),
        SLOT_BID => (FieldId::Bid, None),
        SLOT_ASK => (FieldId::Ask, None),
        SLOT_SIDE => (FieldId::Side, None),
        SLOT_PRICE => (FieldId::Price, None),
        SLOT_SIZE => (FieldId::Size, None),
        SLOT_STRIKE => (FieldId::Strike, None),
        SLOT_EXPIRATION => (FieldId::Expiration, None),
        SLOT_OPTION_KIND => (FieldId::OptionKind, None),
        s if s < SLOT_ASK_DEPTH => (FieldId::BidDepth, Some((s - SLOT_BID_DEPTH) as u8)),
        s => (FieldId::AskDepth, Some((s - SLOT_ASK_DEPTH) as u8)),
    }
}

/// Slot a field id (and depth level) decodes into.
pub(crate) fn field_slot(field: FieldId, level: u8) -> Option<usize> {
    let level = level as usize;
    match field {
        FieldId::Time => Some(SLOT_TIME),
        FieldId::Bid => Some(SLOT_BID),
        FieldId::Ask => Some(SLOT_ASK),
        FieldId::Side => Some(SLOT_SIDE),
        FieldId::Price => Some(SLOT_PRICE),
        FieldId::Size => Some(SLOT_SIZE),
        FieldId::Strike => Some(SLOT_STRIKE),
        FieldId::Expiration => Some(SLOT_EXPIRATION),
        FieldId::OptionKind => Some(SLOT_OPTION_KIND),
        FieldId::BidDepth if level < DEPTH_LEVELS => Some(SLOT_BID_DEPTH + level),
        FieldId::AskDepth if level < DEPTH_LEVELS => Some(SLOT_ASK_DEPTH + level),
        _ => None,
    }
}

/// Tick in the integer domain the codec differences against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Baseline {
    pub content: u8,
    pub values: [i64; SLOTS],
}

impl Baseline {
    pub const ZERO: Baseline = Baseline {
        content: 0,
        values: [0; SLOTS],
    };

    /// Scale a tick's prices by `precision` and lay it out in slots.
    pub fn from_tick(tick: &Tick, precision: &Precision) -> Self {
        let mut values = [0i64; SLOTS];
        values[SLOT_TIME] = tick.utc_time.ticks();
        values[SLOT_BID] = precision.scale(tick.bid);
        values[SLOT_ASK] = precision.scale(tick.ask);
        values[SLOT_SIDE] = tick.side as i64;
        values[SLOT_PRICE] = precision.scale(tick.price);
        values[SLOT_SIZE] = tick.size;
        values[SLOT_STRIKE] = precision.scale(tick.strike);
        values[SLOT_EXPIRATION] = tick.expiration.ticks();
        values[SLOT_OPTION_KIND] = tick.option_kind as i64;
        values[SLOT_BID_DEPTH..SLOT_ASK_DEPTH].copy_from_slice(&tick.bid_sizes);
        values[SLOT_ASK_DEPTH..SLOTS].copy_from_slice(&tick.ask_sizes);
        Baseline {
            content: tick.content.bits(),
            values,
        }
    }

    pub fn mask(&self) -> ContentMask {
        ContentMask::from_bits(self.content)
    }

    /// Slot ranges of the groups present in this baseline, time first.
    pub fn present_slots(&self) -> impl Iterator<Item = usize> {
        let mask = self.mask();
        let groups = [
            (ContentMask::QUOTE, QUOTE_SLOTS),
            (ContentMask::TRADE, TRADE_SLOTS),
            (ContentMask::OPTION, OPTION_SLOTS),
            (ContentMask::DEPTH, DEPTH_SLOTS),
        ];
        std::iter::once(SLOT_TIME).chain(
            groups
                .into_iter()
                .filter(move |(flag, _)| mask.contains(*flag))
                .flat_map(|(_, range)| range),
        )
    }

    /// Rebuild a tick, unscaling prices. Groups not in the mask stay zero.
    pub fn to_tick(&self, symbol: SymbolKey, precision: &Precision) -> Tick {
        let v = &self.values;
        let mut bid_sizes = [0i64; DEPTH_LEVELS];
        let mut ask_sizes = [0i64; DEPTH_LEVELS];
        bid_sizes.copy_from_slice(&v[SLOT_BID_DEPTH..SLOT_ASK_DEPTH]);
        ask_sizes.copy_from_slice(&v[SLOT_ASK_DEPTH..SLOTS]);
        Tick {
            symbol,
            utc_time: Timestamp::from_ticks(v[SLOT_TIME]),
            content: self.mask(),
            bid: precision.unscale(v[SLOT_BID]),
            ask: precision.unscale(v[SLOT_ASK]),
            side: TradeSide::from_u8(v[SLOT_SIDE] as u8),
            price: precision.unscale(v[SLOT_PRICE]),
            size: v[SLOT_SIZE],
            strike: precision.unscale(v[SLOT_STRIKE]),
            expiration: Timestamp::from_ticks(v[SLOT_EXPIRATION]),
            option_kind: OptionKind::from_u8(v[SLOT_OPTION_KIND] as u8),
            bid_sizes,
            ask_sizes,
        }
        .normalized()
    }

    /// Overwrite time and the present groups with `other`'s values.
    pub fn absorb(&mut self, other: &Baseline) {
        self.content = other.content;
        for slot in other.present_slots() {
            self.values[slot] = other.values[slot];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_class_boundaries() {
        assert_eq!(SizeClass::for_value(0), SizeClass::One);
        assert_eq!(SizeClass::for_value(127), SizeClass::One);
        assert_eq!(SizeClass::for_value(-128), SizeClass::One);
        assert_eq!(SizeClass::for_value(128), SizeClass::Two);
        assert_eq!(SizeClass::for_value(-129), SizeClass::Two);
        assert_eq!(SizeClass::for_value(32_767), SizeClass::Two);
        assert_eq!(SizeClass::for_value(32_768), SizeClass::Four);
        assert_eq!(SizeClass::for_value(i32::MIN as i64), SizeClass::Four);
        assert_eq!(SizeClass::for_value(i32::MAX as i64 + 1), SizeClass::Eight);
        assert_eq!(SizeClass::for_value(i64::MIN), SizeClass::Eight);
    }

    #[test]
    fn test_put_take_sized() {
        let mut buf = [0u8; 16];
        for value in [-1i64, 300, -70_000, i64::MAX] {
            let size = SizeClass::for_value(value);
            put_sized(&mut buf, 3, size, value);
            let mut pos = 3;
            assert_eq!(take_sized(&buf, &mut pos, size, 0).unwrap(), value);
            assert_eq!(pos, 3 + size.width());
        }
    }

    #[test]
    fn test_take_sized_truncated() {
        let buf = [0u8; 3];
        let mut pos = 1;
        assert!(take_sized(&buf, &mut pos, SizeClass::Four, 9).is_err());
    }

    #[test]
    fn test_tag_layout() {
        let tag = FieldId::Bid.tag(SizeClass::Four);
        assert_eq!(tag >> 3, FieldId::Bid as u8);
        assert_eq!(tag & 0x07, SizeClass::Four as u8);
    }

    #[test]
    fn test_slot_field_roundtrip() {
        for slot in 0..SLOTS {
            let (field, level) = slot_field(slot);
            assert_eq!(field_slot(field, level.unwrap_or(0)), Some(slot));
        }
        assert_eq!(field_slot(FieldId::BidDepth, DEPTH_LEVELS as u8), None);
        assert_eq!(field_slot(FieldId::Reset, 0), None);
    }
}
