//! Version-dispatched tick decoder.
//!
//! Every record starts with either a length byte (tagged versions 8-11) or,
//! for streams written before length framing existed, the version byte of a
//! fixed layout (1-7). The two cannot be told apart from the bytes alone, so
//! the decoder uses the "legacy window" rule: while no record has been read
//! yet, a first byte below 8 means a fixed layout, and the stream keeps that
//! framing from then on. A fixed layout file whose first byte is 8 or more
//! would be misread; the rule is kept as-is because existing files rely on it.

use super::checksum::record_checksum;
use super::field::{field_slot, take_sized, Baseline, FieldId, SizeClass, DEPTH_SLOTS, OPTION_SLOTS};
use super::layouts::{layout, FixedLayout, LAST_FIXED_VERSION};
use super::rules::{FormatRules, FIRST_TAGGED_VERSION};
use super::encoder::RECORD_HEADER_LEN;
use tickstore_core::{ContentMask, Precision, StoreError, StoreResult, SymbolKey, Tick};

/// How records of one data version are laid out.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RecordFormat {
    /// Versions 1-7
    Fixed(&'static FixedLayout),
    /// Versions 8-11
    Tagged(FormatRules),
}

/// Dispatch table from data version to record format.
pub(crate) fn record_format(version: u8) -> Option<RecordFormat> {
    match version {
        1..=LAST_FIXED_VERSION => layout(version).map(RecordFormat::Fixed),
        _ => FormatRules::for_version(version).map(RecordFormat::Tagged),
    }
}

/// True if `version` can be decoded.
pub fn is_supported_version(version: u8) -> bool {
    record_format(version).is_some()
}

/// Framing decided by the first record of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Undecided,
    /// Version byte first, no length
    Fixed,
    /// Length byte first
    LengthPrefixed,
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// The tick
    pub tick: Tick,
    /// Data version of the record
    pub version: u8,
    /// Bytes consumed from the input
    pub consumed: usize,
}

/// Stateful decoder for one symbol's record chain.
#[derive(Debug, Clone)]
pub struct TickDecoder {
    symbol: SymbolKey,
    precision: Precision,
    baseline: Baseline,
    framing: Framing,
    data_version: Option<u8>,
}

impl TickDecoder {
    /// Create a decoder positioned at the start of a stream
    pub fn new(symbol: SymbolKey) -> Self {
        TickDecoder {
            symbol,
            precision: Precision::FULL,
            baseline: Baseline::ZERO,
            framing: Framing::Undecided,
            data_version: None,
        }
    }

    /// Data version of the last decoded record
    pub fn data_version(&self) -> Option<u8> {
        self.data_version
    }

    /// Precision currently applied to tagged records
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Forget the delta baseline, as at the start of a block.
    ///
    /// The framing decision of the stream is kept.
    pub fn reset(&mut self) {
        self.baseline = Baseline::ZERO;
        self.precision = Precision::FULL;
    }

    /// Decode the record at the start of `input`.
    ///
    /// `offset` is the position of `input[0]` in the file and only feeds
    /// error messages.
    pub fn decode(&mut self, input: &[u8], offset: u64) -> StoreResult<DecodedRecord> {
        let first = *input
            .first()
            .ok_or_else(|| StoreError::invalid_record(offset, "empty input"))?;

        let fixed = match self.framing {
            Framing::Fixed => true,
            Framing::LengthPrefixed => false,
            Framing::Undecided => first < FIRST_TAGGED_VERSION,
        };

        let record = if fixed {
            self.decode_fixed(first, input, offset)?
        } else {
            self.decode_framed(first as usize, input, offset)?
        };

        if self.framing == Framing::Undecided {
            self.framing = if fixed {
                Framing::Fixed
            } else {
                Framing::LengthPrefixed
            };
        }
        self.data_version = Some(record.version);
        Ok(record)
    }

    fn decode_fixed(&mut self, version: u8, input: &[u8], offset: u64) -> StoreResult<DecodedRecord> {
        let layout = match record_format(version) {
            Some(RecordFormat::Fixed(layout)) => layout,
            _ => return Err(StoreError::UnsupportedVersion { version, offset }),
        };
        let (tick, consumed) = layout.decode(input, self.symbol, offset)?;
        Ok(DecodedRecord {
            tick,
            version,
            consumed,
        })
    }

    fn decode_framed(&mut self, len: usize, input: &[u8], offset: u64) -> StoreResult<DecodedRecord> {
        if len < RECORD_HEADER_LEN {
            return Err(StoreError::invalid_record(
                offset,
                format!("record length {} is shorter than its header", len),
            ));
        }
        let record = input.get(..len).ok_or_else(|| {
            StoreError::invalid_record(
                offset,
                format!("record of {} bytes truncated to {}", len, input.len()),
            )
        })?;
        let version = record[1];

        match record_format(version) {
            Some(RecordFormat::Tagged(rules)) => {
                let tick = self.decode_tagged(&rules, record, offset)?;
                Ok(DecodedRecord {
                    tick,
                    version,
                    consumed: len,
                })
            }
            // A fixed layout inside a length frame: the body starts at the version byte.
            Some(RecordFormat::Fixed(layout)) => {
                let (tick, used) = layout.decode(&record[1..], self.symbol, offset + 1)?;
                if used + 1 != len {
                    return Err(StoreError::invalid_record(
                        offset,
                        format!("version {} body is {} bytes, frame says {}", version, used, len - 1),
                    ));
                }
                Ok(DecodedRecord {
                    tick,
                    version,
                    consumed: len,
                })
            }
            None => Err(StoreError::UnsupportedVersion { version, offset }),
        }
    }

    fn decode_tagged(&mut self, rules: &FormatRules, record: &[u8], offset: u64) -> StoreResult<Tick> {
        let declared = record[2];
        let mut precision = if rules.reset_and_precision {
            self.precision
        } else {
            Precision::FULL
        };
        let mut working = self.reference(rules);
        let mut reset = false;

        let mut pos = RECORD_HEADER_LEN;
        while pos < record.len() {
            let tag = record[pos];
            pos += 1;
            let field = FieldId::from_u8(tag >> 3).ok_or_else(|| {
                StoreError::invalid_record(offset, format!("unknown field id {}", tag >> 3))
            })?;

            if field == FieldId::Reset {
                working = Baseline::ZERO;
                precision = Precision::FULL;
                reset = true;
                continue;
            }

            let size = SizeClass::from_u8(tag & 0x07).ok_or_else(|| {
                StoreError::invalid_record(offset, format!("bad size class {}", tag & 0x07))
            })?;
            let level = if matches!(field, FieldId::BidDepth | FieldId::AskDepth) {
                let level = *record
                    .get(pos)
                    .ok_or_else(|| StoreError::invalid_record(offset, "missing depth level"))?;
                pos += 1;
                level
            } else {
                0
            };
            let value = take_sized(record, &mut pos, size, offset)?;

            match field {
                FieldId::Precision => {
                    precision = Precision::from_factor(value)
                        .map_err(|e| StoreError::invalid_record(offset, e.to_string()))?;
                }
                FieldId::ContentMask => {
                    working.content = ContentMask::from_bits(value as u8).bits();
                }
                _ => {
                    let slot = field_slot(field, level).ok_or_else(|| {
                        StoreError::invalid_record(
                            offset,
                            format!("depth level {} out of range", level),
                        )
                    })?;
                    working.values[slot] = working.values[slot].wrapping_add(value);
                }
            }
        }

        let computed = record_checksum(&working);
        if rules.verify_checksum && computed != declared {
            return Err(StoreError::corruption(
                "",
                offset,
                declared as i64,
                computed as i64,
                format!("version {} record checksum", rules.version),
            ));
        }

        if rules.running_baseline {
            if reset {
                self.baseline = Baseline::ZERO;
            }
            self.baseline.absorb(&working);
        }
        if rules.reset_and_precision {
            self.precision = precision;
        }
        Ok(working.to_tick(self.symbol, &precision))
    }

    fn reference(&self, rules: &FormatRules) -> Baseline {
        if !rules.running_baseline {
            return Baseline::ZERO;
        }
        let mut reference = self.baseline;
        if !rules.delta_options {
            reference.values[OPTION_SLOTS].fill(0);
        }
        if !rules.delta_depth {
            reference.values[DEPTH_SLOTS].fill(0);
        }
        reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder::TickEncoder;
    use crate::codec::layouts::encode_fixed;
    use tickstore_core::{OptionKind, Price, SymbolInfo, Timestamp, TradeSide};

    fn eurusd() -> SymbolInfo {
        SymbolInfo::new(3, "EURUSD", 0.0001)
    }

    fn sample_ticks() -> Vec<Tick> {
        let key = SymbolKey(3);
        let base = 638_400_000_000_000_000i64;
        vec![
            Tick::builder(key, Timestamp::from_ticks(base))
                .quote(Price::from_f64(1.2345), Price::from_f64(1.2347))
                .build(),
            Tick::builder(key, Timestamp::from_ticks(base + 10))
                .quote(Price::from_f64(1.2346), Price::from_f64(1.2347))
                .trade(TradeSide::Buy, Price::from_f64(1.2347), 1_000_000)
                .build(),
            Tick::builder(key, Timestamp::from_ticks(base + 25))
                .option(OptionKind::Put, Price::from_f64(1.25), Timestamp::from_ticks(base + 1_000_000))
                .depth([10, 20, 30, 40, 50], [15, 25, 35, 45, 55])
                .build(),
            Tick::builder(key, Timestamp::from_ticks(base + 25))
                .quote(Price::from_f64(1.2340), Price::from_f64(1.2349))
                .depth([11, 20, 30, 40, 51], [15, 25, 35, 45, 55])
                .build(),
        ]
    }

    fn encode_all(encoder: &mut TickEncoder, ticks: &[Tick]) -> Vec<u8> {
        let mut out = Vec::new();
        for tick in ticks {
            encoder.encode(tick, &mut out).unwrap();
        }
        out
    }

    fn decode_all(bytes: &[u8]) -> Vec<DecodedRecord> {
        let mut decoder = TickDecoder::new(SymbolKey(3));
        let mut pos = 0;
        let mut records = Vec::new();
        while pos < bytes.len() {
            let record = decoder.decode(&bytes[pos..], pos as u64).unwrap();
            pos += record.consumed;
            records.push(record);
        }
        records
    }

    #[test]
    fn test_roundtrip_every_tagged_version() {
        for version in 8..=11 {
            let mut encoder = TickEncoder::new(&eurusd()).unwrap().with_version(version).unwrap();
            let ticks = sample_ticks();
            let bytes = encode_all(&mut encoder, &ticks);
            let records = decode_all(&bytes);
            assert_eq!(records.len(), ticks.len());
            for (record, tick) in records.iter().zip(&ticks) {
                assert_eq!(record.version, version);
                assert_eq!(&record.tick, tick, "version {}", version);
            }
        }
    }

    #[test]
    fn test_quote_scenario_at_pip_precision() {
        let mut encoder = TickEncoder::new(&eurusd()).unwrap();
        let tick = &sample_ticks()[0];
        let bytes = encode_all(&mut encoder, std::slice::from_ref(tick));
        let records = decode_all(&bytes);
        assert_eq!(records[0].tick.bid, Price::from_f64(1.2345));
        assert_eq!(records[0].tick.ask, Price::from_f64(1.2347));
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let mut encoder = TickEncoder::new(&eurusd()).unwrap();
        let tick = Tick::builder(SymbolKey(3), Timestamp::from_ticks(0))
            .quote(Price::from_f64(1.2345), Price::from_f64(0.0))
            .build();
        let mut bytes = encode_all(&mut encoder, &[tick]);
        // Last field is the bid diff 12345 as i16
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let err = TickDecoder::new(SymbolKey(3)).decode(&bytes, 40).unwrap_err();
        match err {
            StoreError::Corruption { offset, expected, computed, .. } => {
                assert_eq!(offset, 40);
                assert_ne!(expected, computed);
            }
            other => panic!("expected corruption, got {other:?}"),
        }
    }

    #[test]
    fn test_version_8_skips_checksum() {
        let mut encoder = TickEncoder::new(&eurusd()).unwrap().with_version(8).unwrap();
        let mut bytes = encode_all(&mut encoder, &sample_ticks()[..1]);
        bytes[2] ^= 0xFF;
        assert!(TickDecoder::new(SymbolKey(3)).decode(&bytes, 0).is_ok());
    }

    #[test]
    fn test_unsupported_version() {
        let bytes = [3u8, 12, 0];
        let err = TickDecoder::new(SymbolKey(3)).decode(&bytes, 5).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { version: 12, offset: 5 }));
    }

    #[test]
    fn test_legacy_window_selects_fixed_layout() {
        let ticks = sample_ticks();
        let mut bytes = Vec::new();
        encode_fixed(4, &ticks[0], &mut bytes).unwrap();
        encode_fixed(4, &ticks[1], &mut bytes).unwrap();
        let records = decode_all(&bytes);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].version, 4);
        assert_eq!(records[0].consumed, 39);
        assert_eq!(records[1].tick, ticks[1]);
    }

    #[test]
    fn test_framed_stream_sticks_to_length_prefix() {
        let mut encoder = TickEncoder::new(&eurusd()).unwrap();
        let first = sample_ticks()[0].clone();
        let mut second = first.clone();
        second.utc_time = Timestamp::from_ticks(first.utc_time.ticks() + 1);
        let bytes = encode_all(&mut encoder, &[first, second.clone()]);

        let mut decoder = TickDecoder::new(SymbolKey(3));
        let head = decoder.decode(&bytes, 0).unwrap();
        assert_eq!(decoder.data_version(), Some(11));
        // The second record is 5 bytes long; its length byte is still a length
        assert_eq!(bytes[head.consumed], 5);
        let next = decoder.decode(&bytes[head.consumed..], head.consumed as u64).unwrap();
        assert_eq!(next.consumed, 5);
        assert_eq!(next.tick, second);
    }

    #[test]
    fn test_truncated_framed_record() {
        let mut encoder = TickEncoder::new(&eurusd()).unwrap();
        let bytes = encode_all(&mut encoder, &sample_ticks()[..1]);
        let err = TickDecoder::new(SymbolKey(3))
            .decode(&bytes[..bytes.len() - 1], 0)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }
}
