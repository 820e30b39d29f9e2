//! Fixed limits of the tick model
//!
//! These values are baked into the on-disk formats and cannot change without
//! a new data version.

/// Number of depth-of-book levels carried by a tick
pub const DEPTH_LEVELS: usize = 5;

/// Global fixed-point scale of a [`Price`](crate::Price) (nine decimal places)
pub const PRICE_SCALE: i64 = 1_000_000_000;

/// Maximum number of decimal places a symbol precision can have
pub const MAX_DECIMALS: u32 = 9;

/// Maximum encoded size of one tick record (the length prefix is one byte)
pub const MAX_RECORD_LEN: usize = u8::MAX as usize;
