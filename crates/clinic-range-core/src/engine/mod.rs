//! Clinic range engine.
//!
//! Pipeline: RangeSpec → clinic-local day keys → day arithmetic → UTC bounds

mod clock;
mod params;
mod zone;

pub use clock::*;
pub use params::*;
pub use zone::*;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;
use tracing::debug;

use crate::config::{process_timezone, ClinicTimezone};
use crate::models::{ClinicDayKey, RangeBound, RangePreset, RangeSpec, ResolvedRange};

/// Range engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid day key: {0}")]
    InvalidDayKey(String),

    #[error("Custom range is missing its '{0}' bound")]
    MissingRangeBound(&'static str),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Custom range starts after it ends: {from} > {to}")]
    InvertedRange { from: String, to: String },

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("Preset '{preset}' covers {expected} days, got {actual}")]
    PresetSpanMismatch {
        preset: String,
        expected: i64,
        actual: i64,
    },

    #[error("Preset '{0}' takes no bounds")]
    UnexpectedRangeBound(String),
}

pub type RangeResult<T> = Result<T, RangeError>;

/// Resolves range specs and day keys against one clinic timezone.
#[derive(Debug, Clone)]
pub struct RangeEngine {
    timezone: ClinicTimezone,
    clock: Arc<dyn Clock>,
}

impl Default for RangeEngine {
    fn default() -> Self {
        Self::new(ClinicTimezone::default())
    }
}

impl RangeEngine {
    /// Engine on the system clock.
    pub fn new(timezone: ClinicTimezone) -> Self {
        Self::with_clock(timezone, Arc::new(SystemClock))
    }

    /// Engine on an explicit clock.
    pub fn with_clock(timezone: ClinicTimezone, clock: Arc<dyn Clock>) -> Self {
        Self { timezone, clock }
    }

    /// Engine on the process-wide timezone read from the environment.
    pub fn from_process_config() -> Self {
        Self::new(process_timezone().clone())
    }

    /// The clinic timezone this engine resolves against.
    pub fn timezone(&self) -> &ClinicTimezone {
        &self.timezone
    }

    /// Current instant on the clinic's wall clock.
    pub fn now(&self) -> DateTime<FixedOffset> {
        to_local(self.clock.now(), &self.timezone)
    }

    /// Clinic day containing the instant.
    pub fn day_key(&self, instant: DateTime<Utc>) -> RangeResult<ClinicDayKey> {
        day_key_at(instant, &self.timezone)
    }

    /// Clinic day containing the current instant.
    pub fn day_key_now(&self) -> RangeResult<ClinicDayKey> {
        self.day_key(self.clock.now())
    }

    /// Clinic day of an instant given as text. Unparseable text is an error.
    pub fn day_key_of_str(&self, input: &str) -> RangeResult<ClinicDayKey> {
        self.day_key(self.parse_instant(input)?)
    }

    /// Parse an instant, reading offset-less wall times as clinic-local.
    pub fn parse_instant(&self, input: &str) -> RangeResult<DateTime<Utc>> {
        parse_instant(input, &self.timezone)
    }

    /// Resolve a spec against the current instant.
    ///
    /// Returns `None` for [`RangeSpec::All`], meaning no date filter.
    pub fn resolve_range(&self, spec: &RangeSpec) -> RangeResult<Option<ResolvedRange>> {
        self.resolve_range_at(spec, self.clock.now())
    }

    /// Resolve a spec as if `now` were the current instant.
    pub fn resolve_range_at(
        &self,
        spec: &RangeSpec,
        now: DateTime<Utc>,
    ) -> RangeResult<Option<ResolvedRange>> {
        let preset = spec.preset();

        let (start, end) = match spec {
            RangeSpec::All => return Ok(None),
            RangeSpec::Custom { from, to } => {
                let from = from.ok_or(RangeError::MissingRangeBound("from"))?;
                let to = to.ok_or(RangeError::MissingRangeBound("to"))?;
                self.custom_days(from, to)?
            }
            _ => {
                let (back, days) = preset
                    .relative_window()
                    .ok_or_else(|| RangeError::UnknownPreset(preset.to_string()))?;
                let start = self.day_key(now)?.add_days(-back)?;
                (start, start.add_days(days)?)
            }
        };

        let range = self.build_range(preset, start, end)?;
        debug!(
            preset = %preset,
            start = %range.start_day_key,
            end = %range.end_day_key,
            "Resolved clinic range"
        );
        Ok(Some(range))
    }

    /// The single clinic day named by a key.
    pub fn day_key_to_range(&self, key: &str) -> RangeResult<ResolvedRange> {
        self.day_range(ClinicDayKey::parse(key)?)
    }

    /// The single clinic day `key`.
    pub fn day_range(&self, key: ClinicDayKey) -> RangeResult<ResolvedRange> {
        self.build_range(RangePreset::Custom, key, key.succ()?)
    }

    /// Half-open membership; `None` matches everything.
    pub fn in_range(&self, instant: DateTime<Utc>, range: Option<&ResolvedRange>) -> bool {
        crate::models::in_range(instant, range)
    }

    /// Membership for an instant given as text.
    pub fn in_range_str(&self, instant: &str, range: Option<&ResolvedRange>) -> RangeResult<bool> {
        Ok(self.in_range(self.parse_instant(instant)?, range))
    }

    /// Day keys for custom bounds: (first included day, day after the last).
    pub(crate) fn custom_days(
        &self,
        from: RangeBound,
        to: RangeBound,
    ) -> RangeResult<(ClinicDayKey, ClinicDayKey)> {
        let first = self.bound_key(from)?;
        let last = self.bound_key(to)?;
        if first > last {
            return Err(RangeError::InvertedRange {
                from: first.to_string(),
                to: last.to_string(),
            });
        }
        Ok((first, last.succ()?))
    }

    fn bound_key(&self, bound: RangeBound) -> RangeResult<ClinicDayKey> {
        match bound {
            RangeBound::Instant(instant) => self.day_key(instant),
            RangeBound::Day(key) => Ok(key),
        }
    }

    pub(crate) fn build_range(
        &self,
        preset: RangePreset,
        start_day_key: ClinicDayKey,
        end_day_key: ClinicDayKey,
    ) -> RangeResult<ResolvedRange> {
        Ok(ResolvedRange {
            preset,
            start_utc: day_start_utc(start_day_key, &self.timezone)?,
            end_utc: day_start_utc(end_day_key, &self.timezone)?,
            start_day_key,
            end_day_key,
        })
    }
}
