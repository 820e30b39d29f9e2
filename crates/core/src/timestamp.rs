//! 100-nanosecond UTC timestamp type
//!
//! Every tick carries one of these. It is also the on-disk representation of
//! block first/last timestamps and the file creation time.
//!
//! ## Precision
//!
//! Timestamps are stored as 100-nanosecond "ticks" since 0001-01-01 00:00:00 UTC.
//! This provides:
//! - Sub-microsecond ordering of market updates
//! - A signed 64-bit range covering years 1 through 9999
//! - Direct compatibility with the historical file formats, which store the
//!   same quantity (or, for the oldest layouts, an OLE automation date)
//!
//! ## Usage
//!
//! ```
//! use tickstore_core::Timestamp;
//!
//! let t = Timestamp::from_unix_micros(1_700_000_000_000_000);
//! assert_eq!(Timestamp::from_ticks(t.ticks()), t);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Ticks in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks in one day.
pub const TICKS_PER_DAY: i64 = 86_400 * TICKS_PER_SECOND;

/// Ticks between 0001-01-01 and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Ticks between 0001-01-01 and the OLE automation epoch (1899-12-30).
pub const OLE_EPOCH_TICKS: i64 = 599_264_352_000_000_000;

/// UTC timestamp in 100-nanosecond ticks since 0001-01-01.
///
/// ## Invariants
///
/// - Timestamps are totally ordered
/// - `Timestamp::default()` is the zero baseline used by the codec
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The zero timestamp (0001-01-01 00:00:00 UTC)
    pub const MIN: Timestamp = Timestamp(0);

    /// Maximum representable timestamp
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a timestamp from raw ticks
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Timestamp(ticks)
    }

    /// Create a timestamp for the current moment
    ///
    /// Returns the Unix epoch if the system clock is before it.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(UNIX_EPOCH_TICKS + (duration.as_nanos() / 100) as i64)
    }

    /// Create a timestamp from microseconds since the Unix epoch
    pub const fn from_unix_micros(micros: i64) -> Self {
        Timestamp(UNIX_EPOCH_TICKS.saturating_add(micros.saturating_mul(10)))
    }

    /// Create a timestamp from a chrono UTC datetime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let secs = dt.timestamp();
        let sub = i64::from(dt.timestamp_subsec_nanos()) / 100;
        Timestamp(
            UNIX_EPOCH_TICKS
                .saturating_add(secs.saturating_mul(TICKS_PER_SECOND))
                .saturating_add(sub),
        )
    }

    /// Create a timestamp from an OLE automation date (days since 1899-12-30).
    ///
    /// Layouts 1 and 2 stored time this way. Rounded to the nearest tick.
    pub fn from_ole_date(days: f64) -> Self {
        let ticks = (days * TICKS_PER_DAY as f64).round() as i64;
        Timestamp(OLE_EPOCH_TICKS.saturating_add(ticks))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Raw ticks since 0001-01-01
    #[inline]
    pub const fn ticks(&self) -> i64 {
        self.0
    }

    /// Microseconds since the Unix epoch (truncates)
    pub const fn unix_micros(&self) -> i64 {
        self.0.saturating_sub(UNIX_EPOCH_TICKS) / 10
    }

    /// Convert to an OLE automation date
    pub fn to_ole_date(&self) -> f64 {
        self.0.saturating_sub(OLE_EPOCH_TICKS) as f64 / TICKS_PER_DAY as f64
    }

    /// Convert to a chrono UTC datetime
    ///
    /// Returns `None` outside chrono's representable range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let since_unix = self.0.saturating_sub(UNIX_EPOCH_TICKS);
        let secs = since_unix.div_euclid(TICKS_PER_SECOND);
        let nanos = (since_unix.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
        DateTime::<Utc>::from_timestamp(secs, nanos)
    }

    /// Add a duration, saturating at `Timestamp::MAX`
    pub fn saturating_add(&self, duration: Duration) -> Self {
        let ticks = (duration.as_nanos() / 100).min(i64::MAX as u128) as i64;
        Timestamp(self.0.saturating_add(ticks))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.7f")),
            None => write!(f, "ticks:{}", self.0),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::from_datetime(dt)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unix_epoch() {
        let ts = Timestamp::from_unix_micros(0);
        assert_eq!(ts.ticks(), UNIX_EPOCH_TICKS);
        assert_eq!(ts.unix_micros(), 0);
        assert_eq!(ts.to_string(), "1970-01-01 00:00:00.0000000");
    }

    #[test]
    fn test_datetime_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2012, 3, 14, 9, 30, 15).unwrap();
        let ts = Timestamp::from_datetime(dt);
        assert_eq!(ts.to_datetime(), Some(dt));
    }

    #[test]
    fn test_ole_date() {
        // 1899-12-30 is day zero, 1900-01-01 is day two
        assert_eq!(Timestamp::from_ole_date(0.0).ticks(), OLE_EPOCH_TICKS);
        let ts = Timestamp::from_ole_date(2.5);
        let dt = Utc.with_ymd_and_hms(1900, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(ts.to_datetime(), Some(dt));
        assert!((ts.to_ole_date() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_ordering() {
        let a = Timestamp::from_ticks(100);
        let b = Timestamp::from_ticks(200);
        assert!(a < b);
        assert_eq!(a.saturating_add(Duration::from_nanos(10_000)), b);
        assert_eq!(Timestamp::MAX.saturating_add(Duration::from_secs(1)), Timestamp::MAX);
    }

    #[test]
    fn test_now_after_unix_epoch() {
        assert!(Timestamp::now().ticks() > UNIX_EPOCH_TICKS);
    }
}
