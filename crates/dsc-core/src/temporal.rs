//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to millisecond
//! precision. Every `createdAt`, `signingDate`, and history entry in the
//! connector is a `Timestamp`.
//!
//! ## Ordering
//!
//! Histories must be totally ordered. Wall clocks can step backwards, so
//! appenders use [`Timestamp::not_before()`] to clamp a fresh reading to the
//! previous entry's timestamp.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DscError;

/// A UTC-only timestamp, truncated to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self(truncate_to_millis(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating to milliseconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(dt))
    }

    /// Parse an RFC 3339 string, converting any offset to UTC.
    pub fn parse(s: &str) -> Result<Self, DscError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| DscError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self(truncate_to_millis(dt.with_timezone(&Utc))))
    }

    /// Current time, but never earlier than `floor`.
    pub fn not_before(floor: Option<Timestamp>) -> Self {
        let now = Self::now();
        match floor {
            Some(prev) if prev > now => prev,
            _ => now,
        }
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO8601 with millisecond precision and Z suffix.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    let millis = dt.nanosecond() / 1_000_000;
    dt.with_nanosecond(millis * 1_000_000).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_has_millisecond_precision() {
        let ts = Timestamp::now();
        assert_eq!(ts.as_datetime().nanosecond() % 1_000_000, 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:30:45.123Z");
    }

    #[test]
    fn test_parse_converts_offset_to_utc() {
        let ts = Timestamp::parse("2026-01-15T17:00:00+05:00").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00.000Z");
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(Timestamp::parse("not-a-date").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn test_not_before_clamps_to_floor() {
        let future = Timestamp::from_utc(Utc.with_ymd_and_hms(2999, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(Timestamp::not_before(Some(future)), future);

        let past = Timestamp::from_utc(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
        assert!(Timestamp::not_before(Some(past)) > past);
        assert!(Timestamp::not_before(None) > past);
    }

    #[test]
    fn test_display_matches_iso8601() {
        let ts = Timestamp::from_utc(Utc.with_ymd_and_hms(2026, 6, 30, 23, 59, 59).unwrap());
        assert_eq!(format!("{ts}"), "2026-06-30T23:59:59.000Z");
    }

    #[test]
    fn test_serde_roundtrip() {
        let ts = Timestamp::parse("2026-01-15T12:00:00.250Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }
}
