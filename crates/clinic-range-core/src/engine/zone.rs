//! Conversion primitives between UTC instants and clinic-local calendar time.
//!
//! Everything here works from the pinned offset in [`ClinicTimezone`];
//! the host machine's local zone is never consulted.

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::config::ClinicTimezone;
use crate::models::ClinicDayKey;

use super::{RangeError, RangeResult};

/// Naive formats accepted for clinic-local wall times.
const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Instant seen from the clinic.
pub fn to_local(instant: DateTime<Utc>, tz: &ClinicTimezone) -> DateTime<FixedOffset> {
    instant.with_timezone(&tz.offset())
}

/// Fewest digits accepted as epoch milliseconds. Shorter digit runs such as
/// `20251109` read as compact dates and are rejected instead.
const MIN_EPOCH_MILLIS_DIGITS: usize = 10;

/// Clinic day containing the instant.
///
/// Instants whose clinic day falls outside the key range are
/// [`RangeError::DateOutOfRange`].
pub fn day_key_at(instant: DateTime<Utc>, tz: &ClinicTimezone) -> RangeResult<ClinicDayKey> {
    ClinicDayKey::from_date(to_local(instant, tz).date_naive())
}

/// UTC instant of a clinic-local wall time.
pub fn local_to_utc(local: NaiveDateTime, tz: &ClinicTimezone) -> RangeResult<DateTime<Utc>> {
    tz.offset()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RangeError::DateOutOfRange(local.to_string()))
}

/// UTC instant at which a clinic day begins.
pub fn day_start_utc(key: ClinicDayKey, tz: &ClinicTimezone) -> RangeResult<DateTime<Utc>> {
    local_to_utc(key.date().and_time(NaiveTime::MIN), tz)
}

/// Parse an instant given as text.
///
/// Accepted, in order:
/// - epoch milliseconds (`1762675200000`), at least ten digits
/// - RFC 3339 with an offset or `Z`
/// - date-time without offset, read as clinic-local wall time
/// - bare `YYYY-MM-DD`, read as the start of that clinic day
///
/// Anything else is [`RangeError::InvalidInput`]; the current time is
/// never substituted.
pub fn parse_instant(input: &str, tz: &ClinicTimezone) -> RangeResult<DateTime<Utc>> {
    let raw = input.trim();
    let invalid = || RangeError::InvalidInput(input.to_string());

    if raw.is_empty() {
        return Err(invalid());
    }

    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        if unsigned.len() < MIN_EPOCH_MILLIS_DIGITS {
            return Err(invalid());
        }
        let millis: i64 = raw.parse().map_err(|_| invalid())?;
        return Utc.timestamp_millis_opt(millis).single().ok_or_else(invalid);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in LOCAL_DATETIME_FORMATS {
        if let Ok(local) = NaiveDateTime::parse_from_str(raw, format) {
            return local_to_utc(local, tz);
        }
    }

    if let Ok(key) = ClinicDayKey::parse(raw) {
        return day_start_utc(key, tz);
    }

    Err(invalid())
}
