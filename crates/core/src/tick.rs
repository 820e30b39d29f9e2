//! The tick value
//!
//! A tick is one market update for one symbol at one UTC instant. Field
//! groups are tagged by a [`ContentMask`]; a group's fields are meaningful
//! only when its flag is set, and are kept at zero otherwise so that two
//! ticks with the same content compare equal.

use crate::limits::DEPTH_LEVELS;
use crate::price::Price;
use crate::symbol::SymbolKey;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Bitset of the field groups present in a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentMask(u8);

impl ContentMask {
    /// No groups
    pub const EMPTY: ContentMask = ContentMask(0);
    /// Bid/ask quote
    pub const QUOTE: ContentMask = ContentMask(1);
    /// Trade side, price and size
    pub const TRADE: ContentMask = ContentMask(2);
    /// Option strike, expiration and kind
    pub const OPTION: ContentMask = ContentMask(4);
    /// Depth-of-book sizes
    pub const DEPTH: ContentMask = ContentMask(8);

    const ALL_BITS: u8 = 0x0F;

    /// Create from the stored byte. Unknown bits are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        ContentMask(bits & Self::ALL_BITS)
    }

    /// The stored byte
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// True if every flag of `other` is set
    pub const fn contains(&self, other: ContentMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no flag is set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Set the flags of `other`
    pub fn insert(&mut self, other: ContentMask) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for ContentMask {
    type Output = ContentMask;

    fn bitor(self, rhs: ContentMask) -> ContentMask {
        ContentMask(self.0 | rhs.0)
    }
}

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TradeSide {
    /// Side not reported
    #[default]
    Unknown = 0,
    /// Buyer-initiated
    Buy = 1,
    /// Seller-initiated
    Sell = 2,
    /// Short sale
    SellShort = 3,
}

impl TradeSide {
    /// Decode the stored byte, mapping unknown values to `Unknown`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => TradeSide::Buy,
            2 => TradeSide::Sell,
            3 => TradeSide::SellShort,
            _ => TradeSide::Unknown,
        }
    }
}

/// Kind of an option contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OptionKind {
    /// Not an option
    #[default]
    None = 0,
    /// Call option
    Call = 1,
    /// Put option
    Put = 2,
}

impl OptionKind {
    /// Decode the stored byte, mapping unknown values to `None`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => OptionKind::Call,
            2 => OptionKind::Put,
            _ => OptionKind::None,
        }
    }
}

/// One market update for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Symbol this tick belongs to
    pub symbol: SymbolKey,
    /// UTC time of the update
    pub utc_time: Timestamp,
    /// Which groups below are meaningful
    pub content: ContentMask,
    /// Best bid (quote group)
    pub bid: Price,
    /// Best ask (quote group)
    pub ask: Price,
    /// Trade aggressor side (trade group)
    pub side: TradeSide,
    /// Trade price (trade group)
    pub price: Price,
    /// Trade size (trade group)
    pub size: i64,
    /// Option strike (option group)
    pub strike: Price,
    /// Option expiration (option group)
    pub expiration: Timestamp,
    /// Option kind (option group)
    pub option_kind: OptionKind,
    /// Bid size per depth level (depth group)
    pub bid_sizes: [i64; DEPTH_LEVELS],
    /// Ask size per depth level (depth group)
    pub ask_sizes: [i64; DEPTH_LEVELS],
}

impl Tick {
    /// The symbol-scoped zero tick. This is the codec baseline after a reset.
    pub fn zero(symbol: SymbolKey) -> Self {
        Tick {
            symbol,
            utc_time: Timestamp::MIN,
            content: ContentMask::EMPTY,
            bid: Price::ZERO,
            ask: Price::ZERO,
            side: TradeSide::Unknown,
            price: Price::ZERO,
            size: 0,
            strike: Price::ZERO,
            expiration: Timestamp::MIN,
            option_kind: OptionKind::None,
            bid_sizes: [0; DEPTH_LEVELS],
            ask_sizes: [0; DEPTH_LEVELS],
        }
    }

    /// Start building a tick
    pub fn builder(symbol: SymbolKey, utc_time: Timestamp) -> TickBuilder {
        TickBuilder::new(symbol, utc_time)
    }

    /// True if the quote group is present
    pub fn is_quote(&self) -> bool {
        self.content.contains(ContentMask::QUOTE)
    }

    /// True if the trade group is present
    pub fn is_trade(&self) -> bool {
        self.content.contains(ContentMask::TRADE)
    }

    /// True if the option group is present
    pub fn is_option(&self) -> bool {
        self.content.contains(ContentMask::OPTION)
    }

    /// True if the depth group is present
    pub fn has_depth(&self) -> bool {
        self.content.contains(ContentMask::DEPTH)
    }

    /// Zero every field whose group flag is clear.
    pub fn normalized(mut self) -> Self {
        if !self.is_quote() {
            self.bid = Price::ZERO;
            self.ask = Price::ZERO;
        }
        if !self.is_trade() {
            self.side = TradeSide::Unknown;
            self.price = Price::ZERO;
            self.size = 0;
        }
        if !self.is_option() {
            self.strike = Price::ZERO;
            self.expiration = Timestamp::MIN;
            self.option_kind = OptionKind::None;
        }
        if !self.has_depth() {
            self.bid_sizes = [0; DEPTH_LEVELS];
            self.ask_sizes = [0; DEPTH_LEVELS];
        }
        self
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.symbol, self.utc_time)?;
        if self.is_quote() {
            write!(f, " {}/{}", self.bid, self.ask)?;
        }
        if self.is_trade() {
            write!(f, " {:?} {}@{}", self.side, self.size, self.price)?;
        }
        if self.is_option() {
            write!(
                f,
                " {:?} {} exp {}",
                self.option_kind, self.strike, self.expiration
            )?;
        }
        Ok(())
    }
}

/// Builder for [`Tick`]. Setting a group raises its content flag.
#[derive(Debug, Clone)]
pub struct TickBuilder {
    tick: Tick,
}

impl TickBuilder {
    /// Start from the zero tick at the given time
    pub fn new(symbol: SymbolKey, utc_time: Timestamp) -> Self {
        let mut tick = Tick::zero(symbol);
        tick.utc_time = utc_time;
        TickBuilder { tick }
    }

    /// Set the quote group
    pub fn quote(mut self, bid: Price, ask: Price) -> Self {
        self.tick.bid = bid;
        self.tick.ask = ask;
        self.tick.content.insert(ContentMask::QUOTE);
        self
    }

    /// Set the trade group
    pub fn trade(mut self, side: TradeSide, price: Price, size: i64) -> Self {
        self.tick.side = side;
        self.tick.price = price;
        self.tick.size = size;
        self.tick.content.insert(ContentMask::TRADE);
        self
    }

    /// Set the option group
    pub fn option(mut self, kind: OptionKind, strike: Price, expiration: Timestamp) -> Self {
        self.tick.option_kind = kind;
        self.tick.strike = strike;
        self.tick.expiration = expiration;
        self.tick.content.insert(ContentMask::OPTION);
        self
    }

    /// Set the depth group
    pub fn depth(mut self, bid_sizes: [i64; DEPTH_LEVELS], ask_sizes: [i64; DEPTH_LEVELS]) -> Self {
        self.tick.bid_sizes = bid_sizes;
        self.tick.ask_sizes = ask_sizes;
        self.tick.content.insert(ContentMask::DEPTH);
        self
    }

    /// Finish the tick
    pub fn build(self) -> Tick {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_flags() {
        let tick = Tick::builder(SymbolKey(7), Timestamp::from_ticks(1))
            .quote(Price::from_f64(1.0), Price::from_f64(1.5))
            .trade(TradeSide::Buy, Price::from_f64(1.25), 100)
            .build();
        assert!(tick.is_quote());
        assert!(tick.is_trade());
        assert!(!tick.is_option());
        assert!(!tick.has_depth());
        assert_eq!(tick.content, ContentMask::QUOTE | ContentMask::TRADE);
    }

    #[test]
    fn test_normalized_clears_absent_groups() {
        let mut tick = Tick::builder(SymbolKey(1), Timestamp::from_ticks(5))
            .quote(Price::from_raw(10), Price::from_raw(11))
            .build();
        tick.size = 99;
        tick.bid_sizes[2] = 4;
        let normalized = tick.clone().normalized();
        assert_eq!(normalized.size, 0);
        assert_eq!(normalized.bid_sizes, [0; DEPTH_LEVELS]);
        assert_eq!(normalized.bid, tick.bid);
    }

    #[test]
    fn test_content_mask_bits() {
        let mask = ContentMask::from_bits(0xFF);
        assert_eq!(mask.bits(), 0x0F);
        assert!(mask.contains(ContentMask::DEPTH));
        assert!(ContentMask::EMPTY.is_empty());
    }

    #[test]
    fn test_enum_bytes() {
        assert_eq!(TradeSide::from_u8(TradeSide::SellShort as u8), TradeSide::SellShort);
        assert_eq!(TradeSide::from_u8(200), TradeSide::Unknown);
        assert_eq!(OptionKind::from_u8(OptionKind::Put as u8), OptionKind::Put);
        assert_eq!(OptionKind::from_u8(9), OptionKind::None);
    }
}
