//! Temporal types for the store.
//!
//! All timestamps and intervals in sysdb are integer microseconds. A
//! `Timestamp` measures microseconds since the Unix epoch when it denotes a
//! point in time, and a plain microsecond count when it denotes a duration
//! (update intervals, object age); the two uses share one representation,
//! and all formatting uses integer arithmetic only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One second, in microseconds.
pub const SECOND: u64 = 1_000_000;
/// One minute, in microseconds.
pub const MINUTE: u64 = 60 * SECOND;
/// One hour, in microseconds.
pub const HOUR: u64 = 60 * MINUTE;
/// One day, in microseconds.
pub const DAY: u64 = 24 * HOUR;
/// One month (30 days), in microseconds.
pub const MONTH: u64 = 30 * DAY;
/// One year (365 days), in microseconds.
pub const YEAR: u64 = 365 * DAY;

/// Microseconds since the Unix epoch.
///
/// # Examples
///
/// ```
/// use sysdb::Timestamp;
///
/// let ts = Timestamp::from_secs(60);
/// assert_eq!(ts.as_micros(), 60_000_000);
/// assert_eq!(ts.format_datetime(), "1970-01-01 00:01:00 +0000");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Creates a timestamp from microseconds since the epoch.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Creates a timestamp from whole seconds since the epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * SECOND)
    }

    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let micros = Utc::now().timestamp_micros();
        Self(u64::try_from(micros).unwrap_or(0))
    }

    /// Returns the value in microseconds.
    #[must_use]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Returns the value in whole seconds (truncated).
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0 / SECOND
    }

    /// Difference to an earlier timestamp, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, earlier: Self) -> Self {
        Self(self.0.saturating_sub(earlier.0))
    }

    /// Sum of two timestamps, clamping at the representable maximum.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Renders the timestamp as `"YYYY-MM-DD HH:MM:SS +0000"` (UTC).
    ///
    /// This is the fixed format used throughout the JSON output.
    #[must_use]
    pub fn format_datetime(&self) -> String {
        match i64::try_from(self.0)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_micros)
        {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S %z").to_string(),
            None => "<error>".to_string(),
        }
    }

    /// Renders the value as a human-readable duration.
    ///
    /// Non-zero components are concatenated largest first using the unit
    /// ladder `Y`, `M`, `D`, `h`, `m`, `s`, `ms`, `us`; zero renders as
    /// `"0s"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sysdb::Timestamp;
    ///
    /// assert_eq!(Timestamp::from_micros(0).format_interval(), "0s");
    /// assert_eq!(Timestamp::from_secs(90).format_interval(), "1m30s");
    /// ```
    #[must_use]
    pub fn format_interval(&self) -> String {
        const UNITS: [(u64, &str); 8] = [
            (YEAR, "Y"),
            (MONTH, "M"),
            (DAY, "D"),
            (HOUR, "h"),
            (MINUTE, "m"),
            (SECOND, "s"),
            (1_000, "ms"),
            (1, "us"),
        ];

        if self.0 == 0 {
            return "0s".to_string();
        }

        let mut remaining = self.0;
        let mut out = String::new();
        for (unit, suffix) in UNITS {
            let n = remaining / unit;
            if n > 0 {
                out.push_str(&n.to_string());
                out.push_str(suffix);
                remaining %= unit;
            }
        }
        out
    }
}

impl From<u64> for Timestamp {
    fn from(micros: u64) -> Self {
        Self(micros)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_datetime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_formatting() {
        assert_eq!(
            Timestamp::EPOCH.format_datetime(),
            "1970-01-01 00:00:00 +0000"
        );
        assert_eq!(
            Timestamp::from_micros(1).format_datetime(),
            "1970-01-01 00:00:00 +0000"
        );
        assert_eq!(
            Timestamp::from_secs(1).format_datetime(),
            "1970-01-01 00:00:01 +0000"
        );
    }

    #[test]
    fn test_datetime_formatting_recent() {
        // 2014-01-01 00:00:00 UTC
        let ts = Timestamp::from_secs(1_388_534_400);
        assert_eq!(ts.format_datetime(), "2014-01-01 00:00:00 +0000");
    }

    #[test]
    fn test_interval_zero() {
        assert_eq!(Timestamp::from_micros(0).format_interval(), "0s");
    }

    #[test]
    fn test_interval_single_units() {
        assert_eq!(Timestamp::from_secs(1).format_interval(), "1s");
        assert_eq!(Timestamp::from_secs(60).format_interval(), "1m");
        assert_eq!(Timestamp::from_secs(3600).format_interval(), "1h");
        assert_eq!(Timestamp::from_micros(1_000).format_interval(), "1ms");
        assert_eq!(Timestamp::from_micros(10).format_interval(), "10us");
    }

    #[test]
    fn test_interval_composed() {
        assert_eq!(Timestamp::from_secs(90).format_interval(), "1m30s");
        assert_eq!(
            Timestamp::from_micros(1_500_999).format_interval(),
            "1s500ms999us"
        );
        assert_eq!(
            Timestamp::from_micros(YEAR + DAY + 30 * SECOND).format_interval(),
            "1Y1D30s"
        );
    }

    #[test]
    fn test_saturating_arithmetic() {
        let a = Timestamp::from_micros(10);
        let b = Timestamp::from_micros(30);
        assert_eq!(b.saturating_sub(a).as_micros(), 20);
        assert_eq!(a.saturating_sub(b).as_micros(), 0);
        assert_eq!(
            Timestamp::from_micros(u64::MAX).saturating_add(a).as_micros(),
            u64::MAX
        );
    }

    #[test]
    fn test_now_is_past_2020() {
        // 2020-01-01 in microseconds
        assert!(Timestamp::now().as_micros() > 1_577_836_800 * SECOND);
    }

    #[test]
    fn test_conversions() {
        let ts: Timestamp = 42u64.into();
        assert_eq!(ts.as_micros(), 42);
        let raw: u64 = ts.into();
        assert_eq!(raw, 42);
        assert_eq!(Timestamp::from_secs(2).as_secs(), 2);
    }

    #[test]
    fn test_serde_transparent() {
        let ts = Timestamp::from_micros(123);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "123");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
