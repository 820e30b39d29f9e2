//! Tick codec
//!
//! Encodes one tick as a compact, checksummed record and decodes records of
//! every historical data version:
//!
//! - `field`: tags, size classes and the slot baseline
//! - `checksum`: XOR checksum over semantic values
//! - `rules`: per-version behavior of the tagged family (8-11)
//! - `layouts`: fixed layouts of versions 1-7
//! - `encoder` / `decoder`: the stateful delta codec

pub mod checksum;
pub mod decoder;
pub mod encoder;
mod field;
pub mod layouts;
pub mod rules;

pub use decoder::{is_supported_version, DecodedRecord, TickDecoder};
pub use encoder::{EncoderCheckpoint, TickEncoder, RECORD_HEADER_LEN};
pub use field::{FieldId, SizeClass};
pub use layouts::encode_fixed;
pub use rules::{FormatRules, CURRENT_DATA_VERSION, FIRST_TAGGED_VERSION};
