//! Clinic timezone configuration.
//!
//! The clinic observes one fixed UTC offset. The IANA identifier is kept for
//! display and validation; all arithmetic uses the pinned offset.

use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default clinic timezone identifier.
pub const DEFAULT_TIMEZONE: &str = "Africa/Juba";

/// Default clinic offset (UTC+2).
pub const DEFAULT_UTC_OFFSET: &str = "+02:00";

const DEFAULT_UTC_OFFSET_SECS: i32 = 2 * 3600;

/// Environment variable naming the clinic timezone.
pub const ENV_TIMEZONE: &str = "CLINIC_TIMEZONE";

/// Environment variable pinning the clinic UTC offset.
pub const ENV_UTC_OFFSET: &str = "CLINIC_UTC_OFFSET";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid UTC offset: {0}")]
    InvalidOffset(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// The clinic's timezone: an identifier plus the constant offset in force.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicTimezone {
    name: String,
    offset: FixedOffset,
}

impl ClinicTimezone {
    /// Build from an identifier and an explicit offset.
    pub fn new(name: impl Into<String>, offset: FixedOffset) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }

    /// Build from an identifier and an offset in seconds east of UTC.
    pub fn fixed(name: impl Into<String>, offset_seconds: i32) -> ConfigResult<Self> {
        let offset = FixedOffset::east_opt(offset_seconds)
            .ok_or_else(|| ConfigError::InvalidOffset(offset_seconds.to_string()))?;
        Ok(Self::new(name, offset))
    }

    /// IANA-style identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pinned offset.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Offset in seconds east of UTC.
    pub fn offset_seconds(&self) -> i32 {
        self.offset.local_minus_utc()
    }

    /// Offset rendered as `±HH:MM`.
    pub fn offset_label(&self) -> String {
        let secs = self.offset_seconds();
        let sign = if secs < 0 { '-' } else { '+' };
        let abs = secs.unsigned_abs();
        format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
    }
}

impl Default for ClinicTimezone {
    fn default() -> Self {
        let offset = FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
        Self::new(DEFAULT_TIMEZONE, offset)
    }
}

impl fmt::Display for ClinicTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.offset_label())
    }
}

/// Serializable clinic configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClinicConfig {
    /// IANA timezone identifier
    pub timezone: String,
    /// Pinned offset (`+02:00`); derived from the timezone database when absent
    pub utc_offset: Option<String>,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            utc_offset: Some(DEFAULT_UTC_OFFSET.to_string()),
        }
    }
}

impl ClinicConfig {
    /// Parse from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read `CLINIC_TIMEZONE` / `CLINIC_UTC_OFFSET` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the two settings through an arbitrary lookup.
    ///
    /// Naming a timezone without an offset clears the default offset so the
    /// offset is derived from the named zone rather than from Juba.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(timezone) = non_empty(ENV_TIMEZONE) {
            config.timezone = timezone;
            config.utc_offset = None;
        }
        if let Some(offset) = non_empty(ENV_UTC_OFFSET) {
            config.utc_offset = Some(offset);
        }
        config
    }

    /// Validate and pin the timezone.
    pub fn into_timezone(self) -> ConfigResult<ClinicTimezone> {
        let tz: Tz = self
            .timezone
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))?;

        if observes_dst(tz) {
            warn!(
                timezone = %self.timezone,
                "Timezone observes daylight saving; clinic days use a single pinned offset"
            );
        }

        let offset = match self.utc_offset.as_deref() {
            Some(raw) => parse_offset(raw)?,
            None => tz.offset_from_utc_datetime(&Utc::now().naive_utc()).fix(),
        };

        debug!(
            timezone = %self.timezone,
            offset = offset.local_minus_utc(),
            "Clinic timezone loaded"
        );
        Ok(ClinicTimezone::new(self.timezone, offset))
    }
}

/// Parse `Z`, `UTC`, `±HH`, `±HHMM` or `±HH:MM`.
pub fn parse_offset(input: &str) -> ConfigResult<FixedOffset> {
    let raw = input.trim();
    let invalid = || ConfigError::InvalidOffset(input.to_string());

    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    let colon_ok = match rest.find(':') {
        None => true,
        Some(idx) => idx == 2 && rest.matches(':').count() == 1,
    };
    if !colon_ok || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };

    if hours > 14 || minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Whether the zone's offset differs between January and July this year.
fn observes_dst(tz: Tz) -> bool {
    let year = Utc::now().year();
    let offset_on = |month: u32| {
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| tz.offset_from_utc_datetime(&naive).fix())
    };
    offset_on(1) != offset_on(7)
}

static PROCESS_TIMEZONE: OnceLock<ClinicTimezone> = OnceLock::new();

/// Process-wide clinic timezone, read from the environment once.
///
/// Invalid configuration is logged and replaced by the default.
pub fn process_timezone() -> &'static ClinicTimezone {
    PROCESS_TIMEZONE.get_or_init(|| match ClinicConfig::from_env().into_timezone() {
        Ok(tz) => tz,
        Err(e) => {
            warn!(error = %e, "Invalid clinic timezone configuration, using default");
            ClinicTimezone::default()
        }
    })
}
