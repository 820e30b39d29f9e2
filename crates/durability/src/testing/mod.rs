//! Fixtures for compatibility and integration tests
//!
//! - Deterministic tick sequences covering every content group
//! - Streams written in any supported data version, together with the ticks
//!   a reader is expected to get back
//! - Byte-level corruption of files on disk
//!
//! # Example
//!
//! ```ignore
//! use tickstore_durability::testing::{sample_ticks, write_versioned_stream};
//!
//! let ticks = sample_ticks(SymbolKey(1), 100, Timestamp::from_ticks(0));
//! let expected = write_versioned_stream(&path, 6, &symbol, &ticks)?;
//! ```

use crate::codec::{encode_fixed, TickEncoder, FIRST_TAGGED_VERSION};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tickstore_core::{
    ContentMask, OptionKind, Price, StoreResult, SymbolInfo, SymbolKey, Tick,
    Timestamp, TradeSide, DEPTH_LEVELS,
};

/// Raw price units per cent
const CENT: i64 = 10_000_000;

/// Deterministic ticks on a 0.01 price grid with increasing timestamps.
///
/// Every tick quotes; every third trades, every fifth carries an option and
/// every seventh carries depth.
pub fn sample_ticks(symbol: SymbolKey, count: usize, start: Timestamp) -> Vec<Tick> {
    let mut time = start.ticks();
    (0..count as i64)
        .map(|i| {
            time += 10_000 + (i * 7_919) % 50_000;
            let mid = 10_000 + (i * 37) % 400;
            let mut builder = Tick::builder(symbol, Timestamp::from_ticks(time))
                .quote(Price::from_raw(mid * CENT), Price::from_raw((mid + 1 + i % 3) * CENT));
            if i % 3 == 0 {
                let side = match i % 4 {
                    0 => TradeSide::Buy,
                    1 => TradeSide::Sell,
                    2 => TradeSide::SellShort,
                    _ => TradeSide::Unknown,
                };
                builder = builder.trade(side, Price::from_raw((mid + i % 2) * CENT), 100 * (1 + i % 50));
            }
            if i % 5 == 0 {
                let kind = if i % 10 == 0 { OptionKind::Call } else { OptionKind::Put };
                builder = builder.option(
                    kind,
                    Price::from_raw((mid / 100) * 100 * CENT),
                    Timestamp::from_ticks(start.ticks() + 30 * 86_400 * 10_000_000),
                );
            }
            if i % 7 == 0 {
                let mut bids = [0i64; DEPTH_LEVELS];
                let mut asks = [0i64; DEPTH_LEVELS];
                for level in 0..DEPTH_LEVELS {
                    bids[level] = 10 * (level as i64 + 1) + i % 10;
                    asks[level] = 20 * (level as i64 + 1) + i % 13;
                }
                builder = builder.depth(bids, asks);
            }
            builder.build()
        })
        .collect()
}

/// The tick a reader returns after `tick` was stored in `version`.
///
/// Older layouts drop groups they have no fields for and narrow integers.
/// Versions 1-3 round-trip prices through `f64`, and versions 1-2 store the
/// time as an OLE date.
pub fn as_stored(tick: &Tick, version: u8) -> Tick {
    let mut t = tick.clone().normalized();
    match version {
        1..=3 => {
            if version <= 2 {
                t.utc_time = Timestamp::from_ole_date(t.utc_time.to_ole_date());
            }
            t.bid = Price::from_f64(t.bid.to_f64());
            t.ask = Price::from_f64(t.ask.to_f64());
            let mut content = ContentMask::QUOTE;
            if version == 1 {
                t.price = Price::ZERO;
            } else {
                t.price = Price::from_f64(t.price.to_f64());
                t.size = t.size as i32 as i64;
                if t.price != Price::ZERO {
                    content.insert(ContentMask::TRADE);
                }
            }
            t.content = content;
            if version == 1 {
                return t.normalized();
            }
            // The trade group is implied by a price; side and size are kept as written
            let side = t.side;
            let size = t.size;
            let mut stored = t.normalized();
            if !stored.is_trade() {
                stored.side = side;
                stored.size = size;
            }
            stored
        }
        4..=7 => {
            let mut bits = t.content.bits() & (ContentMask::QUOTE | ContentMask::TRADE).bits();
            if version == 7 {
                bits |= t.content.bits() & ContentMask::OPTION.bits();
            }
            if version >= 5 {
                bits |= t.content.bits() & ContentMask::DEPTH.bits();
            }
            if version < 6 {
                t.size = t.size as i32 as i64;
            }
            if version == 5 {
                for size in t.bid_sizes.iter_mut().chain(t.ask_sizes.iter_mut()) {
                    *size = *size as u16 as i64;
                }
            } else {
                for size in t.bid_sizes.iter_mut().chain(t.ask_sizes.iter_mut()) {
                    *size = *size as i32 as i64;
                }
            }
            t.content = ContentMask::from_bits(bits);
            t.normalized()
        }
        _ => t,
    }
}

/// Write `ticks` to `path` as a legacy stream in `version` and return the
/// ticks a reader should get back.
///
/// Versions 8 and later use `symbol`'s precision where the version supports
/// one, so prices must lie on its grid to come back unchanged.
pub fn write_versioned_stream(
    path: &Path,
    version: u8,
    symbol: &SymbolInfo,
    ticks: &[Tick],
) -> StoreResult<Vec<Tick>> {
    let mut bytes = Vec::new();
    if version < FIRST_TAGGED_VERSION {
        for tick in ticks {
            encode_fixed(version, tick, &mut bytes)?;
        }
    } else {
        let mut encoder = TickEncoder::new(symbol)?.with_version(version)?;
        for tick in ticks {
            encoder.encode(tick, &mut bytes)?;
        }
    }
    std::fs::write(path, &bytes)?;
    Ok(ticks.iter().map(|t| as_stored(t, version)).collect())
}

/// XOR the byte at `offset` of the file at `path` with `mask`.
pub fn corrupt_byte(path: &Path, offset: u64, mask: u8) -> StoreResult<()> {
    let mut file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut byte)?;
    byte[0] ^= mask;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&byte)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_ticks_cover_every_group() {
        let ticks = sample_ticks(SymbolKey(1), 70, Timestamp::from_ticks(1_000));
        assert!(ticks.windows(2).all(|w| w[0].utc_time < w[1].utc_time));
        assert!(ticks.iter().all(|t| t.is_quote()));
        assert!(ticks.iter().any(|t| t.is_trade()));
        assert!(ticks.iter().any(|t| t.is_option()));
        assert!(ticks.iter().any(|t| t.has_depth()));
    }

    #[test]
    fn test_as_stored_drops_unsupported_groups() {
        let ticks = sample_ticks(SymbolKey(1), 1, Timestamp::from_ticks(1_000));
        let full = &ticks[0];
        assert!(full.is_option() && full.has_depth() && full.is_trade());

        let v1 = as_stored(full, 1);
        assert_eq!(v1.content, ContentMask::QUOTE);
        let v4 = as_stored(full, 4);
        assert!(v4.is_trade() && !v4.is_option() && !v4.has_depth());
        let v6 = as_stored(full, 6);
        assert!(v6.has_depth() && !v6.is_option());
        assert_eq!(&as_stored(full, 11), full);
    }

    #[test]
    fn test_corrupt_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, [0u8; 4]).unwrap();
        corrupt_byte(&path, 2, 0x81).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0, 0, 0x81, 0]);
    }
}
