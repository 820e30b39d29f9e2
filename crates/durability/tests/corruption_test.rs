//! Corruption detection tests
//!
//! These tests verify that damaged files are reported, never silently read:
//! - A flipped price bit fails the record checksum
//! - A damaged block header fails before any record is decoded
//! - A damaged file header is not mistaken for a blocked file
//! - A file cut mid-block is corruption, never a legacy stream

use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tickstore_core::{Price, StoreError, SymbolInfo, SymbolKey, Tick, Timestamp};
use tickstore_durability::testing::{corrupt_byte, sample_ticks};
use tickstore_durability::{
    read_all, BlockTickFile, ReadFilter, TickFile, TickFileOptions, TickStream, BLOCK_HEADER_SIZE,
};

const BLOCK_SIZE: u64 = 512;

fn symbol() -> SymbolInfo {
    SymbolInfo::new(2, "EURUSD", 0.0001)
}

fn quote(time: i64, bid: f64, ask: f64) -> Tick {
    Tick::builder(SymbolKey(2), Timestamp::from_ticks(time))
        .quote(Price::from_f64(bid), Price::from_f64(ask))
        .build()
}

fn write(path: &Path, ticks: &[Tick]) {
    let options = TickFileOptions::write()
        .with_block_size(BLOCK_SIZE as usize)
        .with_retry_delay(Duration::from_millis(1));
    let mut file = TickFile::open(path, &symbol(), &options).unwrap();
    for tick in ticks {
        file.try_write_tick(tick).unwrap();
    }
    file.close().unwrap();
}

fn read(path: &Path) -> Result<Vec<Tick>, StoreError> {
    read_all(path, &symbol(), &TickFileOptions::read())
}

#[test]
fn test_flipped_bid_bit_is_corruption() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("eurusd.tck");
    write(&path, &[quote(1_000, 1.2345, 1.2347)]);
    assert_eq!(read(&path).unwrap().len(), 1);

    // The only record is [len][ver][chk] .. [bid tag][bid lo][bid hi][ask tag][ask lo][ask hi]
    // with the scaled prices 12345 and 12347 stored in two bytes each.
    let record = BLOCK_SIZE + BLOCK_HEADER_SIZE as u64;
    let len = std::fs::read(&path).unwrap()[record as usize] as u64;
    let bid_low = record + len - 5;
    corrupt_byte(&path, bid_low, 0x01).unwrap();

    let err = read(&path).unwrap_err();
    assert!(err.is_corruption(), "expected corruption, got {:?}", err);
    let StoreError::Corruption { file, offset, .. } = err else {
        unreachable!()
    };
    assert_eq!(file, "eurusd.tck");
    assert_eq!(offset, record);
}

#[test]
fn test_damaged_block_header() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("eurusd.tck");
    let ticks: Vec<Tick> = (0..200)
        .map(|i| quote(1_000 + i * 10, 1.2345 + (i % 5) as f64 * 0.0001, 1.2350))
        .collect();
    write(&path, &ticks);
    let (_, blocks) = TickFile::verify(&path).unwrap();
    assert!(blocks.len() >= 2);

    // last_time of the second tick block
    corrupt_byte(&path, 2 * BLOCK_SIZE + 16, 0x04).unwrap();

    let err = TickFile::verify(&path).unwrap_err();
    assert!(err.is_corruption());

    // Reading stops at the damaged block, after the first block's ticks
    let mut file = TickFile::open(&path, &symbol(), &TickFileOptions::read()).unwrap();
    let mut good = 0;
    let err = loop {
        match file.try_read_tick() {
            Ok(Some(_)) => good += 1,
            Ok(None) => panic!("damaged block was read"),
            Err(e) => break e,
        }
    };
    assert!(err.is_corruption());
    assert!(good > 0 && good < ticks.len());
}

#[test]
fn test_damaged_file_header_is_not_blocked() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("eurusd.tck");
    write(&path, &[quote(1_000, 1.2345, 1.2347)]);

    // Block size field
    corrupt_byte(&path, 4, 0x10).unwrap();
    let err = BlockTickFile::open_read(&path, SymbolKey(2), ReadFilter::all()).unwrap_err();
    assert!(err.is_structural());

    // Falls back to the legacy reader, which cannot make sense of a header block
    assert!(read(&path).is_err());
}

fn write_sample(path: &Path, info: &SymbolInfo, count: usize) -> Vec<Tick> {
    let ticks = sample_ticks(info.key, count, Timestamp::from_ticks(638_000_000_000_000_000));
    let options = TickFileOptions::write()
        .with_block_size(1024)
        .with_retry_delay(Duration::from_millis(1));
    let mut file = TickFile::open(path, info, &options).unwrap();
    for tick in &ticks {
        file.try_write_tick(tick).unwrap();
    }
    file.close().unwrap();
    ticks
}

#[test]
fn test_torn_tail_is_corruption() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("es.tck");
    let info = SymbolInfo::new(1, "ES", 0.01);
    write_sample(&path, &info, 500);

    let bytes = std::fs::read(&path).unwrap();
    let torn_len = bytes.len() - 100;
    std::fs::write(&path, &bytes[..torn_len]).unwrap();

    let err = BlockTickFile::open_read(&path, SymbolKey(1), ReadFilter::all()).unwrap_err();
    match err {
        StoreError::Corruption { file, offset, .. } => {
            assert_eq!(file, "es.tck");
            assert_eq!(offset, (torn_len as u64 / 1024) * 1024);
        }
        other => panic!("expected corruption, got {:?}", other),
    }
}

#[test]
fn test_torn_file_never_reads_as_legacy() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("es.tck");
    let info = SymbolInfo::new(1, "ES", 0.01);
    write_sample(&path, &info, 500);

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 100]).unwrap();

    let err = TickFile::open(&path, &info, &TickFileOptions::read()).unwrap_err();
    assert!(err.is_corruption(), "expected corruption, got {:?}", err);
    assert!(read_all(&path, &info, &TickFileOptions::read()).unwrap_err().is_corruption());

    // Appending must not continue a torn file in either format
    let before = std::fs::read(&path).unwrap();
    let err = TickFile::open(&path, &info, &TickFileOptions::write()).unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(std::fs::read(&path).unwrap(), before);
}
