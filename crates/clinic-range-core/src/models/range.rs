//! Range specifications and resolved clinic-day ranges.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::day_key::ClinicDayKey;
use crate::engine::{RangeError, RangeResult};

/// Flat request/cache parameters, ordered so rendered keys are stable.
pub type QueryParams = BTreeMap<String, String>;

/// Named range presets as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePreset {
    Today,
    Yesterday,
    Last7,
    Last30,
    All,
    Custom,
}

impl RangePreset {
    /// Every preset, in wire order.
    pub const ALL: [RangePreset; 6] = [
        RangePreset::Today,
        RangePreset::Yesterday,
        RangePreset::Last7,
        RangePreset::Last30,
        RangePreset::All,
        RangePreset::Custom,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RangePreset::Today => "today",
            RangePreset::Yesterday => "yesterday",
            RangePreset::Last7 => "last7",
            RangePreset::Last30 => "last30",
            RangePreset::All => "all",
            RangePreset::Custom => "custom",
        }
    }

    /// Parse a wire name, ignoring case and surrounding whitespace.
    ///
    /// Unrecognised names are an error; there is no fallback preset.
    pub fn parse(input: &str) -> RangeResult<Self> {
        let wanted = input.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RangeError::UnknownPreset(input.to_string()))
    }

    /// For presets relative to today: (days back from today to the first
    /// included day, number of included days).
    pub fn relative_window(&self) -> Option<(i64, i64)> {
        match self {
            RangePreset::Today => Some((0, 1)),
            RangePreset::Yesterday => Some((1, 1)),
            RangePreset::Last7 => Some((6, 7)),
            RangePreset::Last30 => Some((29, 30)),
            RangePreset::All | RangePreset::Custom => None,
        }
    }
}

impl fmt::Display for RangePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangePreset {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One end of a custom range: either an instant or an explicit clinic day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    /// Keyed by the clinic day containing the instant.
    Instant(DateTime<Utc>),
    /// Used as-is.
    Day(ClinicDayKey),
}

impl From<DateTime<Utc>> for RangeBound {
    fn from(instant: DateTime<Utc>) -> Self {
        RangeBound::Instant(instant)
    }
}

impl From<ClinicDayKey> for RangeBound {
    fn from(key: ClinicDayKey) -> Self {
        RangeBound::Day(key)
    }
}

/// What the caller asked for.
///
/// Custom bounds are optional here so that an incomplete request can be
/// reported as [`RangeError::MissingRangeBound`] instead of being guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    Today,
    Yesterday,
    Last7,
    Last30,
    All,
    Custom {
        from: Option<RangeBound>,
        to: Option<RangeBound>,
    },
}

impl RangeSpec {
    /// Custom range with both bounds present.
    pub fn custom(from: impl Into<RangeBound>, to: impl Into<RangeBound>) -> Self {
        RangeSpec::Custom {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    /// Custom range between two day keys given as strings.
    pub fn custom_days(from: &str, to: &str) -> RangeResult<Self> {
        Ok(Self::custom(ClinicDayKey::parse(from)?, ClinicDayKey::parse(to)?))
    }

    /// Spec for a preset; `Custom` starts with no bounds.
    pub fn from_preset(preset: RangePreset) -> Self {
        match preset {
            RangePreset::Today => RangeSpec::Today,
            RangePreset::Yesterday => RangeSpec::Yesterday,
            RangePreset::Last7 => RangeSpec::Last7,
            RangePreset::Last30 => RangeSpec::Last30,
            RangePreset::All => RangeSpec::All,
            RangePreset::Custom => RangeSpec::Custom {
                from: None,
                to: None,
            },
        }
    }

    /// The preset this spec is an instance of.
    pub fn preset(&self) -> RangePreset {
        match self {
            RangeSpec::Today => RangePreset::Today,
            RangeSpec::Yesterday => RangePreset::Yesterday,
            RangeSpec::Last7 => RangePreset::Last7,
            RangeSpec::Last30 => RangePreset::Last30,
            RangeSpec::All => RangePreset::All,
            RangeSpec::Custom { .. } => RangePreset::Custom,
        }
    }
}

/// A concrete `[start_utc, end_utc)` interval covering whole clinic days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRange {
    /// Preset that produced this range (cache discriminant)
    pub preset: RangePreset,
    /// Inclusive lower bound
    pub start_utc: DateTime<Utc>,
    /// Exclusive upper bound
    pub end_utc: DateTime<Utc>,
    /// Clinic day of `start_utc`
    pub start_day_key: ClinicDayKey,
    /// Clinic day after the last included day
    #[serde(deserialize_with = "super::day_key::deserialize_range_end")]
    pub end_day_key: ClinicDayKey,
}

impl ResolvedRange {
    /// Number of clinic days covered.
    pub fn day_count(&self) -> i64 {
        self.start_day_key.days_until(&self.end_day_key)
    }

    /// Last included clinic day.
    pub fn last_day_key(&self) -> ClinicDayKey {
        // end is always at least one day after start
        self.end_day_key.pred().unwrap_or(self.start_day_key)
    }

    /// Every included clinic day, in order.
    pub fn day_keys(&self) -> impl Iterator<Item = ClinicDayKey> + '_ {
        (0..self.day_count()).filter_map(move |n| self.start_day_key.add_days(n).ok())
    }

    /// Half-open membership: `start_utc <= instant < end_utc`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_utc <= instant && instant < self.end_utc
    }

    /// Bounds as epoch milliseconds, for storage-side `>= start AND < end` filters.
    pub fn bounds_millis(&self) -> (i64, i64) {
        (
            self.start_utc.timestamp_millis(),
            self.end_utc.timestamp_millis(),
        )
    }
}

/// Membership test where `None` means "no date filter".
pub fn in_range(instant: DateTime<Utc>, range: Option<&ResolvedRange>) -> bool {
    range.map_or(true, |r| r.contains(instant))
}
