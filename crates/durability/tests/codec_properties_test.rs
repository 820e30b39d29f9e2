//! Codec property tests
//!
//! Random tick sequences, with every combination of content groups, must
//! decode to exactly what was encoded. Prices are kept on the symbol's
//! precision grid.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tempfile::TempDir;
use tickstore_core::{
    OptionKind, Precision, Price, SymbolInfo, SymbolKey, Tick, Timestamp, TradeSide, DEPTH_LEVELS,
};
use tickstore_durability::{
    read_all, StoreFormat, TickDecoder, TickEncoder, TickFile, TickFileOptions, TickStream,
    CURRENT_DATA_VERSION,
};

/// Raw price units per cent
const CENT: i64 = 10_000_000;

fn cents() -> SymbolInfo {
    SymbolInfo::new(9, "ZN", 0.01)
}

fn tick_strategy() -> impl Strategy<Value = (u8, i64, i64, i64, u8, i64, i64, u8, [i64; DEPTH_LEVELS])> {
    (
        0u8..16,
        1i64..1_000_000,
        -5_000_000i64..5_000_000,
        0i64..10_000,
        0u8..4,
        0i64..1_000_000_000,
        0i64..2_000_000,
        0u8..3,
        prop::array::uniform5(0i64..100_000),
    )
}

fn build(
    time: i64,
    (bits, dt, mid, spread, side, size, strike, kind, depth): (
        u8,
        i64,
        i64,
        i64,
        u8,
        i64,
        i64,
        u8,
        [i64; DEPTH_LEVELS],
    ),
) -> (i64, Tick) {
    let time = time + dt;
    let mut builder = Tick::builder(SymbolKey(9), Timestamp::from_ticks(time));
    if bits & 1 != 0 {
        builder = builder.quote(Price::from_raw(mid * CENT), Price::from_raw((mid + spread) * CENT));
    }
    if bits & 2 != 0 {
        builder = builder.trade(TradeSide::from_u8(side), Price::from_raw(mid * CENT), size);
    }
    if bits & 4 != 0 {
        builder = builder.option(
            OptionKind::from_u8(kind),
            Price::from_raw(strike * CENT),
            Timestamp::from_ticks(time + 86_400 * 10_000_000),
        );
    }
    if bits & 8 != 0 {
        let mut asks = depth;
        asks.reverse();
        builder = builder.depth(depth, asks);
    }
    (time, builder.build())
}

proptest! {
    #[test]
    fn test_encode_decode_sequence(parts in prop::collection::vec(tick_strategy(), 1..64)) {
        let mut time = 638_000_000_000_000_000i64;
        let ticks: Vec<Tick> = parts
            .into_iter()
            .map(|p| {
                let (next, tick) = build(time, p);
                time = next;
                tick
            })
            .collect();

        let mut encoder = TickEncoder::new(&cents()).unwrap();
        let mut bytes = Vec::new();
        for tick in &ticks {
            encoder.encode(tick, &mut bytes).unwrap();
        }

        let mut decoder = TickDecoder::new(SymbolKey(9));
        let mut offset = 0;
        for tick in &ticks {
            let record = decoder.decode(&bytes[offset..], offset as u64).unwrap();
            prop_assert_eq!(&record.tick, tick);
            prop_assert_eq!(record.version, CURRENT_DATA_VERSION);
            offset += record.consumed;
        }
        prop_assert_eq!(offset, bytes.len());
    }

    #[test]
    fn test_repeated_tick_only_changes_time(parts in tick_strategy()) {
        let (_, tick) = build(1_000, parts);
        let mut next = tick.clone();
        next.utc_time = Timestamp::from_ticks(tick.utc_time.ticks() + 1);

        let mut encoder = TickEncoder::new(&cents()).unwrap();
        let mut bytes = Vec::new();
        encoder.encode(&tick, &mut bytes).unwrap();
        let second = encoder.encode(&next, &mut bytes).unwrap();
        // [len][ver][chk][time tag][1]
        prop_assert_eq!(second, 5);
    }
}

#[test]
fn test_precision_keeps_exact_cents() {
    let precision = Precision::from_min_tick(0.01).unwrap();
    assert_eq!(precision.factor(), 100);
    assert_eq!(precision.decimals(), 2);

    let tick = Tick::builder(SymbolKey(9), Timestamp::from_ticks(1_000))
        .quote(Price::from_f64(101.23), Price::from_f64(101.24))
        .build();
    let mut encoder = TickEncoder::new(&cents()).unwrap();
    let mut bytes = Vec::new();
    encoder.encode(&tick, &mut bytes).unwrap();
    let decoded = TickDecoder::new(SymbolKey(9)).decode(&bytes, 0).unwrap().tick;
    assert_eq!(decoded.bid, Price::from_f64(101.23));
    assert_eq!(decoded.bid.to_f64(), 101.23);
}

#[test]
fn test_quote_change_is_small_delta() {
    let fx = SymbolInfo::new(2, "EURUSD", 0.0001);
    let first = Tick::builder(SymbolKey(2), Timestamp::from_ticks(10_000))
        .quote(Price::from_f64(1.2345), Price::from_f64(1.2347))
        .build();
    let second = Tick::builder(SymbolKey(2), Timestamp::from_ticks(10_100))
        .quote(Price::from_f64(1.2346), Price::from_f64(1.2347))
        .build();

    let mut encoder = TickEncoder::new(&fx).unwrap();
    let mut bytes = Vec::new();
    let first_len = encoder.encode(&first, &mut bytes).unwrap();
    let second_len = encoder.encode(&second, &mut bytes).unwrap();
    // Time and bid moved by one step each, the ask did not move
    assert_eq!(second_len, 3 + 2 + 2);
    assert!(second_len < first_len);

    let mut decoder = TickDecoder::new(SymbolKey(2));
    let a = decoder.decode(&bytes, 0).unwrap();
    let b = decoder.decode(&bytes[a.consumed..], a.consumed as u64).unwrap();
    assert_eq!(a.tick, first);
    assert_eq!(b.tick, second);
    assert_eq!(decoder.precision().factor(), 10_000);
}

fn random_walk(rng: &mut StdRng, count: usize) -> Vec<Tick> {
    let mut time = 638_000_000_000_000_000i64;
    let mut mid = 250_000i64;
    (0..count)
        .map(|_| {
            time += rng.gen_range(1..50_000_000);
            mid += rng.gen_range(-3..=3);
            let mut builder = Tick::builder(SymbolKey(9), Timestamp::from_ticks(time))
                .quote(Price::from_raw(mid * CENT), Price::from_raw((mid + rng.gen_range(1..4)) * CENT));
            if rng.gen_bool(0.3) {
                let side = if rng.gen_bool(0.5) { TradeSide::Buy } else { TradeSide::Sell };
                builder = builder.trade(side, Price::from_raw(mid * CENT), rng.gen_range(1..500));
            }
            if rng.gen_bool(0.1) {
                let mut bids = [0i64; DEPTH_LEVELS];
                let mut asks = [0i64; DEPTH_LEVELS];
                for level in 0..DEPTH_LEVELS {
                    bids[level] = rng.gen_range(1..10_000);
                    asks[level] = rng.gen_range(1..10_000);
                }
                builder = builder.depth(bids, asks);
            }
            builder.build()
        })
        .collect()
}

#[test]
fn test_random_stream_in_both_formats() {
    let mut rng = StdRng::seed_from_u64(0x7153_5eed);
    let ticks = random_walk(&mut rng, 5_000);
    let temp_dir = TempDir::new().unwrap();

    for format in [StoreFormat::Blocked, StoreFormat::Legacy] {
        let path = temp_dir.path().join(format!("{:?}.tck", format));
        let options = TickFileOptions::write()
            .with_format(format)
            .with_block_size(2048)
            .with_retry_delay(Duration::from_millis(1));
        let mut file = TickFile::open(&path, &cents(), &options).unwrap();
        for tick in &ticks {
            file.try_write_tick(tick).unwrap();
        }
        file.close().unwrap();

        let read = read_all(&path, &cents(), &TickFileOptions::read()).unwrap();
        assert_eq!(read, ticks, "{:?}", format);
    }
}
