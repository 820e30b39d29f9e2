//! Fixed record layouts of data versions 1-7.
//!
//! These records have no length byte. The first byte is the version and the
//! record size follows from it (plus the depth flag for versions 5-7):
//!
//! ```text
//! v1  [1][time f64 OLE][bid f64][ask f64]                                    25
//! v2  v1 + [side u8][price f64][size i32]                                    38
//! v3  [3][time i64][bid f64][ask f64][side u8][price f64][size i32]          38
//! v4  [4][time i64][content u8][bid i64][ask i64][side u8][price i64][size i32]  39
//! v5  v4 + [has_depth u8] (+ 5x bid u16, 5x ask u16)                         40 (+20)
//! v6  v5 with size i64 and depth i32                                         44 (+40)
//! v7  v6 + [strike i64][expiration i64][kind u8] before the flag             61 (+40)
//! ```
//!
//! Floating point layouts store prices in whole units; integer layouts store
//! raw 10^-9 fixed point.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tickstore_core::{
    ContentMask, OptionKind, Price, StoreError, StoreResult, SymbolKey, Tick, Timestamp,
    TradeSide, DEPTH_LEVELS,
};

/// Last version that uses a fixed layout.
pub const LAST_FIXED_VERSION: u8 = 7;

/// Size and decoder of one fixed layout.
#[derive(Clone, Copy)]
pub(crate) struct FixedLayout {
    pub version: u8,
    /// Record size without depth
    base_len: usize,
    /// Offset of the depth flag, if the layout has one
    depth_flag_at: Option<usize>,
    /// Extra bytes present when the depth flag is set
    depth_len: usize,
    decode: fn(&[u8], SymbolKey) -> StoreResult<Tick>,
}

impl std::fmt::Debug for FixedLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedLayout")
            .field("version", &self.version)
            .field("base_len", &self.base_len)
            .finish()
    }
}

static LAYOUTS: [FixedLayout; 7] = [
    FixedLayout { version: 1, base_len: 25, depth_flag_at: None, depth_len: 0, decode: decode_v1_v2 },
    FixedLayout { version: 2, base_len: 38, depth_flag_at: None, depth_len: 0, decode: decode_v1_v2 },
    FixedLayout { version: 3, base_len: 38, depth_flag_at: None, depth_len: 0, decode: decode_v3 },
    FixedLayout { version: 4, base_len: 39, depth_flag_at: None, depth_len: 0, decode: decode_v4_plus },
    FixedLayout { version: 5, base_len: 40, depth_flag_at: Some(39), depth_len: 20, decode: decode_v4_plus },
    FixedLayout { version: 6, base_len: 44, depth_flag_at: Some(43), depth_len: 40, decode: decode_v4_plus },
    FixedLayout { version: 7, base_len: 61, depth_flag_at: Some(60), depth_len: 40, decode: decode_v4_plus },
];

/// Layout of a fixed version, `None` for 0 and anything above 7
pub(crate) fn layout(version: u8) -> Option<&'static FixedLayout> {
    match version {
        1..=LAST_FIXED_VERSION => LAYOUTS.get(version as usize - 1),
        _ => None,
    }
}

impl FixedLayout {
    /// Size of the record starting at `input[0]`.
    pub fn record_len(&self, input: &[u8], offset: u64) -> StoreResult<usize> {
        let Some(flag_at) = self.depth_flag_at else {
            return Ok(self.base_len);
        };
        let flag = *input.get(flag_at).ok_or_else(|| truncated(self.version, offset))?;
        Ok(if flag != 0 {
            self.base_len + self.depth_len
        } else {
            self.base_len
        })
    }

    /// Decode one complete record.
    pub fn decode(&self, input: &[u8], symbol: SymbolKey, offset: u64) -> StoreResult<(Tick, usize)> {
        let len = self.record_len(input, offset)?;
        let record = input.get(..len).ok_or_else(|| truncated(self.version, offset))?;
        let tick = (self.decode)(record, symbol)
            .map_err(|e| StoreError::invalid_record(offset, e.to_string()))?;
        Ok((tick, len))
    }
}

fn truncated(version: u8, offset: u64) -> StoreError {
    StoreError::invalid_record(offset, format!("truncated version {} record", version))
}

fn float_price(value: f64) -> Price {
    Price::from_f64(value)
}

fn decode_v1_v2(record: &[u8], symbol: SymbolKey) -> StoreResult<Tick> {
    let version = record[0];
    let mut r = &record[1..];
    let time = Timestamp::from_ole_date(r.read_f64::<LittleEndian>()?);
    let mut tick = Tick::zero(symbol);
    tick.utc_time = time;
    tick.bid = float_price(r.read_f64::<LittleEndian>()?);
    tick.ask = float_price(r.read_f64::<LittleEndian>()?);
    tick.content = ContentMask::QUOTE;
    if version == 2 {
        read_float_trade(&mut r, &mut tick)?;
    }
    Ok(tick)
}

fn decode_v3(record: &[u8], symbol: SymbolKey) -> StoreResult<Tick> {
    let mut r = &record[1..];
    let mut tick = Tick::zero(symbol);
    tick.utc_time = Timestamp::from_ticks(r.read_i64::<LittleEndian>()?);
    tick.bid = float_price(r.read_f64::<LittleEndian>()?);
    tick.ask = float_price(r.read_f64::<LittleEndian>()?);
    tick.content = ContentMask::QUOTE;
    read_float_trade(&mut r, &mut tick)?;
    Ok(tick)
}

/// Trade fields of versions 2 and 3; the trade flag is implied by a price.
fn read_float_trade(r: &mut &[u8], tick: &mut Tick) -> StoreResult<()> {
    tick.side = TradeSide::from_u8(r.read_u8()?);
    tick.price = float_price(r.read_f64::<LittleEndian>()?);
    tick.size = r.read_i32::<LittleEndian>()? as i64;
    if tick.price != Price::ZERO {
        tick.content.insert(ContentMask::TRADE);
    }
    Ok(())
}

fn decode_v4_plus(record: &[u8], symbol: SymbolKey) -> StoreResult<Tick> {
    let version = record[0];
    let mut r = &record[1..];
    let mut tick = Tick::zero(symbol);
    tick.utc_time = Timestamp::from_ticks(r.read_i64::<LittleEndian>()?);
    let mut content = r.read_u8()? & (ContentMask::QUOTE | ContentMask::TRADE | ContentMask::OPTION).bits();
    tick.bid = Price::from_raw(r.read_i64::<LittleEndian>()?);
    tick.ask = Price::from_raw(r.read_i64::<LittleEndian>()?);
    tick.side = TradeSide::from_u8(r.read_u8()?);
    tick.price = Price::from_raw(r.read_i64::<LittleEndian>()?);
    tick.size = if version >= 6 {
        r.read_i64::<LittleEndian>()?
    } else {
        r.read_i32::<LittleEndian>()? as i64
    };

    if version >= 7 {
        tick.strike = Price::from_raw(r.read_i64::<LittleEndian>()?);
        tick.expiration = Timestamp::from_ticks(r.read_i64::<LittleEndian>()?);
        tick.option_kind = OptionKind::from_u8(r.read_u8()?);
    } else {
        content &= !ContentMask::OPTION.bits();
    }

    if version >= 5 && r.read_u8()? != 0 {
        content |= ContentMask::DEPTH.bits();
        for level in 0..DEPTH_LEVELS {
            tick.bid_sizes[level] = read_depth(&mut r, version)?;
        }
        for level in 0..DEPTH_LEVELS {
            tick.ask_sizes[level] = read_depth(&mut r, version)?;
        }
    }

    tick.content = ContentMask::from_bits(content);
    Ok(tick.normalized())
}

fn read_depth(r: &mut &[u8], version: u8) -> StoreResult<i64> {
    Ok(if version == 5 {
        r.read_u16::<LittleEndian>()? as i64
    } else {
        r.read_i32::<LittleEndian>()? as i64
    })
}

/// Append `tick` in a fixed layout. Produces compatibility fixtures; the
/// store itself never writes these versions.
pub fn encode_fixed(version: u8, tick: &Tick, out: &mut Vec<u8>) -> StoreResult<usize> {
    let start = out.len();
    match version {
        1 | 2 => {
            out.write_u8(version)?;
            out.write_f64::<LittleEndian>(tick.utc_time.to_ole_date())?;
            out.write_f64::<LittleEndian>(tick.bid.to_f64())?;
            out.write_f64::<LittleEndian>(tick.ask.to_f64())?;
            if version == 2 {
                write_float_trade(out, tick)?;
            }
        }
        3 => {
            out.write_u8(version)?;
            out.write_i64::<LittleEndian>(tick.utc_time.ticks())?;
            out.write_f64::<LittleEndian>(tick.bid.to_f64())?;
            out.write_f64::<LittleEndian>(tick.ask.to_f64())?;
            write_float_trade(out, tick)?;
        }
        4..=LAST_FIXED_VERSION => {
            out.write_u8(version)?;
            out.write_i64::<LittleEndian>(tick.utc_time.ticks())?;
            out.write_u8(tick.content.bits())?;
            out.write_i64::<LittleEndian>(tick.bid.raw())?;
            out.write_i64::<LittleEndian>(tick.ask.raw())?;
            out.write_u8(tick.side as u8)?;
            out.write_i64::<LittleEndian>(tick.price.raw())?;
            if version >= 6 {
                out.write_i64::<LittleEndian>(tick.size)?;
            } else {
                out.write_i32::<LittleEndian>(tick.size as i32)?;
            }
            if version >= 7 {
                out.write_i64::<LittleEndian>(tick.strike.raw())?;
                out.write_i64::<LittleEndian>(tick.expiration.ticks())?;
                out.write_u8(tick.option_kind as u8)?;
            }
            if version >= 5 {
                out.write_u8(tick.has_depth() as u8)?;
                if tick.has_depth() {
                    for size in tick.bid_sizes.iter().chain(tick.ask_sizes.iter()) {
                        if version == 5 {
                            out.write_u16::<LittleEndian>(*size as u16)?;
                        } else {
                            out.write_i32::<LittleEndian>(*size as i32)?;
                        }
                    }
                }
            }
        }
        _ => {
            return Err(StoreError::UnsupportedVersion {
                version,
                offset: start as u64,
            })
        }
    }
    Ok(out.len() - start)
}

fn write_float_trade(out: &mut Vec<u8>, tick: &Tick) -> StoreResult<()> {
    out.write_u8(tick.side as u8)?;
    out.write_f64::<LittleEndian>(tick.price.to_f64())?;
    out.write_i32::<LittleEndian>(tick.size as i32)?;
    Ok(())
}
