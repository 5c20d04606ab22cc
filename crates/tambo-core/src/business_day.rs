//! # Business Day
//!
//! Maps an instant to the calendar date that owns it in the store's fixed
//! timezone. Every register session and every sale is bucketed by this key.
//!
//! ## Boundary
//! ```text
//! Lima (UTC-5, no DST)
//!
//!   2026-03-01 00:00:00.000  ──┐
//!          ...                 │  key "2026-03-01"
//!   2026-03-01 23:59:59.999  ──┘
//!   2026-03-02 00:00:00.000  ──── key "2026-03-02"
//!
//! In UTC the same boundary sits at 05:00:00.
//! ```
//!
//! The offset is a `chrono::FixedOffset`, never a locale string, and the
//! resolver never looks at the host timezone.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Peru: UTC-5 all year.
pub const PERU_UTC_OFFSET_SECS: i32 = -5 * 3600;

// =============================================================================
// Business Day Key
// =============================================================================

/// Calendar date of a business day, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct BusinessDayKey(#[ts(as = "String")] NaiveDate);

impl BusinessDayKey {
    pub const fn from_date(date: NaiveDate) -> Self {
        BusinessDayKey(date)
    }

    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// The following business day.
    pub fn next(&self) -> Option<BusinessDayKey> {
        self.0.succ_opt().map(BusinessDayKey)
    }
}

impl fmt::Display for BusinessDayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for BusinessDayKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(BusinessDayKey)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "business_day".to_string(),
                reason: format!("expected YYYY-MM-DD, got {:?}", s),
            })
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves instants to business-day keys in one fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessDayResolver {
    offset: FixedOffset,
}

impl BusinessDayResolver {
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Resolver for Peru (UTC-5).
    pub fn peru() -> Self {
        Self::new(FixedOffset::east_opt(PERU_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix()))
    }

    /// Builds a resolver from a `±HH:MM` string (configuration).
    pub fn from_offset_str(s: &str) -> Result<Self, ValidationError> {
        parse_offset(s).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Business day that owns `instant`.
    ///
    /// Total over every `DateTime`: the type always carries its offset, so
    /// there is no way to hand this an instant with an unknown zone.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use tambo_core::BusinessDayResolver;
    ///
    /// let r = BusinessDayResolver::peru();
    /// let t = Utc.with_ymd_and_hms(2026, 3, 2, 5, 0, 0).unwrap(); // 00:00 Lima
    /// assert_eq!(r.resolve(t).to_string(), "2026-03-02");
    /// ```
    pub fn resolve<Tz: TimeZone>(&self, instant: DateTime<Tz>) -> BusinessDayKey {
        BusinessDayKey(instant.with_timezone(&self.offset).date_naive())
    }

    /// Resolves an RFC 3339 timestamp from outside the process.
    ///
    /// Fails closed: a missing or malformed offset is a `ValidationError`,
    /// never a guess at local time.
    pub fn resolve_rfc3339(&self, timestamp: &str) -> Result<BusinessDayKey, ValidationError> {
        DateTime::parse_from_rfc3339(timestamp.trim())
            .map(|instant| self.resolve(instant))
            .map_err(|e| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                reason: format!("{} (an explicit UTC offset is required)", e),
            })
    }

    /// UTC bounds of a business day: `[start, end)`.
    ///
    /// Used by range queries over `created_at`.
    pub fn day_bounds(&self, key: BusinessDayKey) -> (DateTime<Utc>, DateTime<Utc>) {
        let midnight = key.date().and_time(chrono::NaiveTime::MIN);
        // A fixed offset has no gaps or folds, so local midnight is unique.
        let start = (midnight - Duration::seconds(i64::from(self.offset.local_minus_utc())))
            .and_utc();
        (start, start + Duration::days(1))
    }
}

impl Default for BusinessDayResolver {
    fn default() -> Self {
        Self::peru()
    }
}

/// Parses `-05:00`, `+0530`, `Z` or `UTC` into a fixed offset.
pub fn parse_offset(s: &str) -> Result<FixedOffset, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "utc_offset".to_string(),
        reason: format!("{}: {:?}", reason, s),
    };

    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| invalid("out of range"));
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid("expected a leading + or -")),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("expected ±HH:MM"));
    }

    let hours: i32 = digits[..2].parse().map_err(|_| invalid("bad hours"))?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid("bad minutes"))?;
    if hours > 14 || minutes > 59 {
        return Err(invalid("out of range"));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| invalid("out of range"))
}

// =============================================================================
// Unit Tests
// =============================================================================
