//! Record checksum.
//!
//! An 8-byte running XOR over the semantic values of a record (time plus
//! every slot of each present group), folded to one byte by XOR-ing its
//! eight bytes. It is computed over the decoded values rather than the
//! encoded bytes, so it also catches a wrong delta baseline.

use super::field::Baseline;

/// Running XOR over the present values.
pub(crate) fn running_xor(values: &Baseline) -> u64 {
    values
        .present_slots()
        .fold(0u64, |acc, slot| acc ^ values.values[slot] as u64)
}

/// Fold an 8-byte checksum to the single byte stored in the record header.
pub fn fold(sum: u64) -> u8 {
    sum.to_le_bytes().iter().fold(0u8, |acc, b| acc ^ b)
}

/// One-byte record checksum.
pub(crate) fn record_checksum(values: &Baseline) -> u8 {
    fold(running_xor(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::field::{SLOT_ASK, SLOT_BID, SLOT_SIZE, SLOT_TIME};
    use tickstore_core::ContentMask;

    #[test]
    fn test_fold() {
        assert_eq!(fold(0), 0);
        assert_eq!(fold(0x0102_0304_0506_0708), 0x01 ^ 0x02 ^ 0x03 ^ 0x04 ^ 0x05 ^ 0x06 ^ 0x07 ^ 0x08);
        assert_eq!(fold(0xFF00), 0xFF);
    }

    #[test]
    fn test_only_present_groups_count() {
        let mut values = Baseline::ZERO;
        values.content = ContentMask::QUOTE.bits();
        values.values[SLOT_TIME] = 0x10;
        values.values[SLOT_BID] = 0x01;
        values.values[SLOT_ASK] = 0x02;
        values.values[SLOT_SIZE] = 0x7F; // trade group absent

        assert_eq!(running_xor(&values), 0x10 ^ 0x01 ^ 0x02);

        values.content |= ContentMask::TRADE.bits();
        assert_eq!(running_xor(&values), 0x10 ^ 0x01 ^ 0x02 ^ 0x7F);
    }
}
