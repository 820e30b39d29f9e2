//! Fixed-point prices and per-symbol precision
//!
//! Prices never travel as floating point inside the store. A [`Price`] is an
//! integer count of 10^-9 units. Before a price is written to disk it is
//! further divided by the symbol's [`Precision`] divisor, so a symbol quoted
//! in cents stores `101.23` as the integer `10123`.

use crate::error::{StoreError, StoreResult};
use crate::limits::{MAX_DECIMALS, PRICE_SCALE};
use serde::{Deserialize, Serialize};

/// Fixed-point price in units of 10^-9.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Price(i64);

impl Price {
    /// Zero price
    pub const ZERO: Price = Price(0);

    /// Create from the raw fixed-point integer
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Price(raw)
    }

    /// Convert a floating point price, rounding to the nearest 10^-9
    pub fn from_f64(value: f64) -> Self {
        Price((value * PRICE_SCALE as f64).round() as i64)
    }

    /// Raw fixed-point integer
    #[inline]
    pub const fn raw(&self) -> i64 {
        self.0
    }

    /// Floating point view, for display only
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// Decimal precision of a symbol, derived from its minimum price increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precision {
    decimals: u32,
    factor: i64,
}

impl Precision {
    /// Precision that keeps the full 10^-9 resolution.
    pub const FULL: Precision = Precision {
        decimals: MAX_DECIMALS,
        factor: PRICE_SCALE,
    };

    /// Derive precision from a minimum price increment.
    ///
    /// The increment is multiplied by ten until it is integral; the number of
    /// multiplications is the decimal count. Increments finer than 10^-9 clamp
    /// to [`Precision::FULL`].
    pub fn from_min_tick(min_tick: f64) -> StoreResult<Self> {
        if !min_tick.is_finite() || min_tick <= 0.0 {
            return Err(StoreError::InvalidOperation(format!(
                "minimum tick must be positive, got {}",
                min_tick
            )));
        }
        let mut value = min_tick;
        let mut decimals = 0;
        while decimals < MAX_DECIMALS && !is_integral(value) {
            value *= 10.0;
            decimals += 1;
        }
        Ok(Precision {
            decimals,
            factor: 10i64.pow(decimals),
        })
    }

    /// Validate a precision factor read back from disk.
    pub fn from_factor(factor: i64) -> StoreResult<Self> {
        let mut decimals = 0;
        let mut probe = 1i64;
        while probe < factor && decimals < MAX_DECIMALS {
            probe *= 10;
            decimals += 1;
        }
        if probe != factor {
            return Err(StoreError::InvalidRecord {
                offset: 0,
                detail: format!("precision factor {} is not a power of ten <= 10^9", factor),
            });
        }
        Ok(Precision { decimals, factor })
    }

    /// Number of decimal places
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Power-of-ten factor (`10^decimals`)
    pub fn factor(&self) -> i64 {
        self.factor
    }

    /// Divisor between a raw [`Price`] and the symbol-scaled integer
    pub fn divisor(&self) -> i64 {
        PRICE_SCALE / self.factor
    }

    /// Convert a price to the symbol-scaled integer, rounding half away from zero
    pub fn scale(&self, price: Price) -> i64 {
        let divisor = self.divisor();
        if divisor == 1 {
            return price.raw();
        }
        let raw = price.raw();
        let quotient = raw / divisor;
        let remainder = raw % divisor;
        if remainder.abs() * 2 >= divisor {
            quotient + raw.signum()
        } else {
            quotient
        }
    }

    /// Convert a symbol-scaled integer back to a price
    pub fn unscale(&self, scaled: i64) -> Price {
        Price::from_raw(scaled.wrapping_mul(self.divisor()))
    }
}

fn is_integral(value: f64) -> bool {
    (value - value.round()).abs() < 1e-9 * value.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_precision_from_cents() {
        let p = Precision::from_min_tick(0.01).unwrap();
        assert_eq!(p.decimals(), 2);
        assert_eq!(p.factor(), 100);
        assert_eq!(p.divisor(), 10_000_000);
    }

    #[test]
    fn test_precision_from_pips() {
        let p = Precision::from_min_tick(0.0001).unwrap();
        assert_eq!(p.decimals(), 4);
        assert_eq!(p.factor(), 10_000);

        let p = Precision::from_min_tick(0.25).unwrap();
        assert_eq!(p.decimals(), 2);

        let p = Precision::from_min_tick(1.0).unwrap();
        assert_eq!(p.decimals(), 0);
        assert_eq!(p.factor(), 1);
    }

    #[test]
    fn test_precision_clamps_to_full() {
        let p = Precision::from_min_tick(1e-12).unwrap();
        assert_eq!(p, Precision::FULL);
        assert_eq!(p.divisor(), 1);
    }

    #[test]
    fn test_precision_rejects_non_positive() {
        assert!(Precision::from_min_tick(0.0).is_err());
        assert!(Precision::from_min_tick(-0.01).is_err());
        assert!(Precision::from_min_tick(f64::NAN).is_err());
    }

    #[test]
    fn test_price_scales_exactly() {
        let p = Precision::from_min_tick(0.01).unwrap();
        let price = Price::from_f64(101.23);
        let scaled = p.scale(price);
        assert_eq!(scaled, 10123);
        assert_eq!(p.unscale(scaled), price);
    }

    #[test]
    fn test_scale_rounds_half_away_from_zero() {
        let p = Precision::from_min_tick(0.01).unwrap();
        assert_eq!(p.scale(Price::from_f64(1.005)), 101);
        assert_eq!(p.scale(Price::from_f64(1.004)), 100);
        assert_eq!(p.scale(Price::from_f64(-1.005)), -101);
    }

    #[test]
    fn test_from_factor() {
        assert_eq!(
            Precision::from_factor(100).unwrap(),
            Precision::from_min_tick(0.01).unwrap()
        );
        assert_eq!(Precision::from_factor(1).unwrap(), Precision::from_min_tick(1.0).unwrap());
        assert!(Precision::from_factor(250).is_err());
        assert!(Precision::from_factor(10_000_000_000).is_err());
    }

    proptest! {
        #[test]
        fn prop_scale_unscale_on_increment_grid(units in -1_000_000_000i64..1_000_000_000, decimals in 0u32..=9) {
            let p = Precision::from_factor(10i64.pow(decimals)).unwrap();
            let price = Price::from_raw(units * p.divisor());
            prop_assert_eq!(p.unscale(p.scale(price)), price);
        }
    }
}
