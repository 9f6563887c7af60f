//! Clinic day key codec.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::engine::{RangeError, RangeResult};

/// Smallest and largest years a day key can name (four-digit years only).
const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

/// Whether a date renders as `YYYY-MM-DD`.
fn representable(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

/// Whether a date can be named as a clinic day: representable, with a
/// representable following day to end its range. Named days run from
/// `0000-01-01` to `9999-12-30`; `9999-12-31` only appears as the
/// exclusive end of a range.
fn nameable(date: NaiveDate) -> bool {
    representable(date) && date.succ_opt().is_some_and(representable)
}

/// Shape check, then calendar check.
fn parse_date(input: &str) -> RangeResult<NaiveDate> {
    let bytes = input.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());

    if !well_formed {
        return Err(RangeError::InvalidDayKey(input.to_string()));
    }

    let field = |range: std::ops::Range<usize>| input[range].parse::<u32>();
    let (year, month, day) = match (field(0..4), field(5..7), field(8..10)) {
        (Ok(y), Ok(m), Ok(d)) => (y as i32, m, d),
        _ => return Err(RangeError::InvalidDayKey(input.to_string())),
    };

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| RangeError::InvalidDayKey(input.to_string()))
}

/// A calendar day as observed in the clinic timezone, written `YYYY-MM-DD`.
///
/// Keys are persisted verbatim by day-scoped records (visit date, order
/// requested date), so the textual form is part of the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClinicDayKey(NaiveDate);

impl ClinicDayKey {
    /// Parse a key of the exact form `YYYY-MM-DD`.
    ///
    /// The shape is checked before the calendar, so `2025-1-5` and
    /// `+2025-01-05` are rejected, and impossible dates such as `2025-02-30`
    /// are never normalized into the following month. `9999-12-31` is
    /// [`RangeError::DateOutOfRange`].
    pub fn parse(input: &str) -> RangeResult<Self> {
        Self::from_date(parse_date(input)?)
    }

    /// Parse the exclusive end key of a range, which may be `9999-12-31`.
    pub(crate) fn parse_range_end(input: &str) -> RangeResult<Self> {
        let date = parse_date(input)?;
        if representable(date) {
            Ok(Self(date))
        } else {
            Err(RangeError::DateOutOfRange(input.to_string()))
        }
    }

    /// Wrap a calendar date that is already expressed in clinic-local terms.
    pub fn from_date(date: NaiveDate) -> RangeResult<Self> {
        if nameable(date) {
            Ok(Self(date))
        } else {
            Err(RangeError::DateOutOfRange(date.to_string()))
        }
    }

    /// The underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Shift by a signed number of calendar days.
    ///
    /// The result may be `9999-12-31` so the last named day has an end.
    pub fn add_days(&self, days: i64) -> RangeResult<Self> {
        let magnitude = Days::new(days.unsigned_abs());
        let shifted = if days >= 0 {
            self.0.checked_add_days(magnitude)
        } else {
            self.0.checked_sub_days(magnitude)
        };

        match shifted {
            Some(date) if representable(date) => Ok(Self(date)),
            _ => Err(RangeError::DateOutOfRange(format!("{} {:+} days", self, days))),
        }
    }

    /// The following day.
    pub fn succ(&self) -> RangeResult<Self> {
        self.add_days(1)
    }

    /// The preceding day.
    pub fn pred(&self) -> RangeResult<Self> {
        self.add_days(-1)
    }

    /// Signed number of days from `self` to `other`.
    pub fn days_until(&self, other: &ClinicDayKey) -> i64 {
        other.0.signed_duration_since(self.0).num_days()
    }
}

impl fmt::Display for ClinicDayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl FromStr for ClinicDayKey {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ClinicDayKey> for String {
    fn from(key: ClinicDayKey) -> Self {
        key.to_string()
    }
}

impl Serialize for ClinicDayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Deserialize an exclusive range end, which may be `9999-12-31`.
pub(crate) fn deserialize_range_end<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<ClinicDayKey, D::Error> {
    let raw = String::deserialize(deserializer)?;
    ClinicDayKey::parse_range_end(&raw).map_err(serde::de::Error::custom)
}

impl<'de> Deserialize<'de> for ClinicDayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
