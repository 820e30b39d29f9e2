//! Tickstore - storage engine for market tick data
//!
//! Ticks (quotes, trades, option terms and depth) are stored per symbol in
//! delta-encoded files. Two on-disk formats are supported:
//!
//! - **Blocked**: fixed-size blocks with verified headers (default for new files)
//! - **Legacy**: one continuous record chain, read in every historical data version
//!
//! # Quick Start
//!
//! ```ignore
//! use tickstore::{SymbolInfo, Tick, TickFile, TickFileOptions, TickStream, Timestamp, Price};
//!
//! let symbol = SymbolInfo::new(1, "EURUSD", 0.0001);
//! let mut file = TickFile::open(&path, &symbol, &TickFileOptions::write())?;
//! let tick = Tick::builder(symbol.key, Timestamp::now())
//!     .quote(Price::from_f64(1.2345), Price::from_f64(1.2347))
//!     .build();
//! file.try_write_tick(&tick)?;
//! file.close()?;
//! ```
//!
//! # Architecture
//!
//! - [`tickstore_core`]: value model, precision and errors
//! - [`tickstore_durability`]: codec, file formats, write pipeline and configuration

pub use tickstore_core::*;
pub use tickstore_durability::*;
