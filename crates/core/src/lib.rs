//! Core types for the tick store
//!
//! This crate defines the value model shared by every layer:
//! - Tick: one market update with quote/trade/option/depth groups
//! - ContentMask: which groups a tick carries
//! - Timestamp: 100-nanosecond UTC ticks
//! - Price / Precision: fixed-point prices and per-symbol scaling
//! - SymbolInfo / SymbolCatalog: symbol metadata seam
//! - StoreError: error taxonomy used by the storage engine

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod price;
pub mod symbol;
pub mod tick;
pub mod timestamp;

pub use error::{StoreError, StoreResult};
pub use limits::{DEPTH_LEVELS, MAX_DECIMALS, MAX_RECORD_LEN, PRICE_SCALE};
pub use price::{Precision, Price};
pub use symbol::{SymbolCatalog, SymbolInfo, SymbolKey, SymbolTable};
pub use tick::{ContentMask, OptionKind, Tick, TickBuilder, TradeSide};
pub use timestamp::Timestamp;
