//! Clinic Range Core Library
//!
//! Clinic-day and timezone range computation shared by the clinic server and
//! its client runtime. One compiled artifact serves both: Rust callers link
//! the library directly, other runtimes go through the generated bindings.
//!
//! # Architecture
//!
//! ```text
//!   RangeSpec (preset | custom bounds)          instant (UTC / text)
//!                 │                                     │
//!                 ▼                                     ▼
//!        ┌─────────────────┐                   ┌─────────────────┐
//!        │  resolve_range  │                   │     day_key     │
//!        │  local day math │◄──── clinic ─────►│  shift + date   │
//!        └────────┬────────┘     timezone      └────────┬────────┘
//!                 │            (fixed offset)           │
//!                 ▼                                     ▼
//!     ResolvedRange [start_utc, end_utc)          ClinicDayKey YYYY-MM-DD
//!                 │                                     │
//!     ┌───────────┼───────────────┐                     │
//!     ▼           ▼               ▼                     ▼
//!  in_range   query params    storage filter     persisted records
//!             / cache key     (bounds_millis)    (day-key audit)
//! ```
//!
//! # Core Principle
//!
//! **Clinic days are computed in the clinic's timezone, never the host's.**
//! Ranges are half-open and invalid input is an error, never a silent default.
//!
//! # Modules
//!
//! - [`config`]: Clinic timezone configuration
//! - [`models`]: Domain types (ClinicDayKey, RangeSpec, ResolvedRange, etc.)
//! - [`engine`]: Range engine, conversion primitives, and the query parameter codec
//! - [`audit`]: Recompute and report stored day keys
//! - [`logging`]: Tracing subscriber setup for host applications

pub mod audit;
pub mod config;
pub mod engine;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use audit::{AuditReport, DayKeyAuditor, DayKeyCorrection};
pub use config::{ClinicConfig, ClinicTimezone, ConfigError};
pub use engine::{
    cache_key, serialize_range_params, Clock, FixedClock, RangeEngine, RangeError, RangeResult,
    SystemClock,
};
pub use models::{
    in_range, ClinicDayKey, DayScoped, DayScopedRecord, QueryParams, RangeBound, RangePreset,
    RangeSpec, ResolvedRange,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicRangeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid day key: {0}")]
    InvalidDayKey(String),

    #[error("Missing range bound: {0}")]
    MissingRangeBound(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Inverted range: {0}")]
    InvertedRange(String),

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("Preset span mismatch: {0}")]
    PresetSpanMismatch(String),

    #[error("Unexpected range bound: {0}")]
    UnexpectedRangeBound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<RangeError> for ClinicRangeError {
    fn from(e: RangeError) -> Self {
        match e {
            RangeError::InvalidInput(s) => ClinicRangeError::InvalidInput(s),
            RangeError::InvalidDayKey(s) => ClinicRangeError::InvalidDayKey(s),
            RangeError::MissingRangeBound(s) => ClinicRangeError::MissingRangeBound(s.to_string()),
            RangeError::UnknownPreset(s) => ClinicRangeError::UnknownPreset(s),
            e @ RangeError::InvertedRange { .. } => ClinicRangeError::InvertedRange(e.to_string()),
            RangeError::DateOutOfRange(s) => ClinicRangeError::DateOutOfRange(s),
            e @ RangeError::PresetSpanMismatch { .. } => {
                ClinicRangeError::PresetSpanMismatch(e.to_string())
            }
            RangeError::UnexpectedRangeBound(s) => ClinicRangeError::UnexpectedRangeBound(s),
        }
    }
}

impl From<ConfigError> for ClinicRangeError {
    fn from(e: ConfigError) -> Self {
        ClinicRangeError::ConfigError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Engine on the default clinic timezone (Africa/Juba, UTC+2).
#[uniffi::export]
pub fn default_engine() -> Arc<ClinicRangeCore> {
    Arc::new(ClinicRangeCore {
        engine: RangeEngine::default(),
    })
}

/// Engine on an explicit timezone; the offset is derived when omitted.
#[uniffi::export]
pub fn open_engine(
    timezone: String,
    utc_offset: Option<String>,
) -> Result<Arc<ClinicRangeCore>, ClinicRangeError> {
    let tz = ClinicConfig {
        timezone,
        utc_offset,
    }
    .into_timezone()?;
    Ok(Arc::new(ClinicRangeCore {
        engine: RangeEngine::new(tz),
    }))
}

/// Engine on the process-wide timezone from `CLINIC_TIMEZONE` / `CLINIC_UTC_OFFSET`.
#[uniffi::export]
pub fn open_engine_from_env() -> Arc<ClinicRangeCore> {
    Arc::new(ClinicRangeCore {
        engine: RangeEngine::from_process_config(),
    })
}

/// Install the tracing subscriber. Returns `false` if one was already set.
#[uniffi::export]
pub fn init_logging(level: String, format: String) -> bool {
    logging::LoggingConfig { level, format }.init()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Range engine handle for foreign callers.
#[derive(uniffi::Object)]
pub struct ClinicRangeCore {
    engine: RangeEngine,
}

impl ClinicRangeCore {
    /// Wrap an existing engine (e.g. one on a fixed clock).
    pub fn from_engine(engine: RangeEngine) -> Arc<Self> {
        Arc::new(Self { engine })
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &RangeEngine {
        &self.engine
    }
}

#[uniffi::export]
impl ClinicRangeCore {
    /// Timezone label, e.g. `Africa/Juba (+02:00)`.
    pub fn timezone(&self) -> String {
        self.engine.timezone().to_string()
    }

    /// Current clinic wall time as RFC 3339 with the clinic offset.
    pub fn now_local(&self) -> String {
        self.engine.now().to_rfc3339_opts(SecondsFormat::Millis, false)
    }

    /// Clinic day of an instant, or of now when omitted.
    pub fn day_key(&self, instant: Option<String>) -> Result<String, ClinicRangeError> {
        let key = match instant {
            Some(raw) => self.engine.day_key_of_str(&raw)?,
            None => self.engine.day_key_now()?,
        };
        Ok(key.to_string())
    }

    /// Resolve a preset (with custom bounds when `preset` is `custom`).
    ///
    /// Bounds may be day keys or instants and are only accepted with
    /// `custom`; passing one with any other preset is an error. `None`
    /// means "all".
    pub fn resolve_range(
        &self,
        preset: String,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<Option<FfiResolvedRange>, ClinicRangeError> {
        let preset = RangePreset::parse(&preset)?;
        let spec = match preset {
            RangePreset::Custom => RangeSpec::Custom {
                from: from.as_deref().map(|b| self.parse_bound(b)).transpose()?,
                to: to.as_deref().map(|b| self.parse_bound(b)).transpose()?,
            },
            other if from.is_some() || to.is_some() => {
                return Err(RangeError::UnexpectedRangeBound(other.to_string()).into());
            }
            other => RangeSpec::from_preset(other),
        };
        let range = self.engine.resolve_range(&spec)?;
        Ok(range.map(Into::into))
    }

    /// Half-open membership; a missing range matches everything.
    pub fn in_range(
        &self,
        instant: String,
        range: Option<FfiResolvedRange>,
    ) -> Result<bool, ClinicRangeError> {
        let range = range.map(ResolvedRange::try_from).transpose()?;
        Ok(self.engine.in_range_str(&instant, range.as_ref())?)
    }

    /// The single clinic day named by a key.
    pub fn day_key_to_range(&self, key: String) -> Result<FfiResolvedRange, ClinicRangeError> {
        Ok(self.engine.day_key_to_range(&key)?.into())
    }

    /// Request parameters for a range.
    pub fn serialize_range_params(
        &self,
        range: Option<FfiResolvedRange>,
    ) -> Result<HashMap<String, String>, ClinicRangeError> {
        let range = range.map(ResolvedRange::try_from).transpose()?;
        Ok(serialize_range_params(range.as_ref()).into_iter().collect())
    }

    /// Rebuild a range from request parameters.
    pub fn parse_range_params(
        &self,
        params: HashMap<String, String>,
    ) -> Result<Option<FfiResolvedRange>, ClinicRangeError> {
        let params: QueryParams = params.into_iter().collect();
        Ok(self.engine.parse_range_params(&params)?.map(Into::into))
    }

    /// Stable cache key for a range.
    pub fn cache_key(&self, range: Option<FfiResolvedRange>) -> Result<String, ClinicRangeError> {
        let range = range.map(ResolvedRange::try_from).transpose()?;
        Ok(cache_key(range.as_ref()))
    }

    /// Recompute stored day keys for a batch of records.
    pub fn audit_day_keys(&self, records: Vec<FfiDayScopedRecord>) -> FfiAuditReport {
        let records: Vec<DayScopedRecord> = records.into_iter().map(Into::into).collect();
        DayKeyAuditor::new(&self.engine).audit(&records).into()
    }
}

impl ClinicRangeCore {
    fn parse_bound(&self, raw: &str) -> Result<RangeBound, ClinicRangeError> {
        match ClinicDayKey::parse(raw.trim()) {
            Ok(key) => Ok(RangeBound::Day(key)),
            Err(_) => Ok(RangeBound::Instant(self.engine.parse_instant(raw)?)),
        }
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe resolved range. Instants are RFC 3339 UTC with milliseconds.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiResolvedRange {
    pub preset: String,
    pub start_utc: String,
    pub end_utc: String,
    pub start_day_key: String,
    pub end_day_key: String,
    pub day_count: u32,
}

fn format_utc(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>, ClinicRangeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ClinicRangeError::InvalidInput(raw.to_string()))
}

impl From<ResolvedRange> for FfiResolvedRange {
    fn from(range: ResolvedRange) -> Self {
        Self {
            preset: range.preset.to_string(),
            start_utc: format_utc(range.start_utc),
            end_utc: format_utc(range.end_utc),
            start_day_key: range.start_day_key.to_string(),
            end_day_key: range.end_day_key.to_string(),
            day_count: range.day_count().max(0) as u32,
        }
    }
}

impl TryFrom<FfiResolvedRange> for ResolvedRange {
    type Error = ClinicRangeError;

    fn try_from(range: FfiResolvedRange) -> Result<Self, Self::Error> {
        let resolved = ResolvedRange {
            preset: RangePreset::parse(&range.preset)?,
            start_utc: parse_utc(&range.start_utc)?,
            end_utc: parse_utc(&range.end_utc)?,
            start_day_key: ClinicDayKey::parse(&range.start_day_key)?,
            end_day_key: ClinicDayKey::parse_range_end(&range.end_day_key)?,
        };
        if resolved.start_utc >= resolved.end_utc || resolved.start_day_key >= resolved.end_day_key {
            return Err(ClinicRangeError::InvertedRange(format!(
                "{} .. {}",
                range.start_utc, range.end_utc
            )));
        }
        Ok(resolved)
    }
}

/// FFI-safe day-scoped record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDayScopedRecord {
    pub record_id: String,
    pub created_at: String,
    pub clinic_day: Option<String>,
}

impl From<FfiDayScopedRecord> for DayScopedRecord {
    fn from(record: FfiDayScopedRecord) -> Self {
        DayScopedRecord {
            record_id: record.record_id,
            created_at: record.created_at,
            clinic_day: record.clinic_day,
        }
    }
}

/// FFI-safe day-key correction.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDayKeyCorrection {
    pub record_id: String,
    pub created_at: String,
    pub stored: Option<String>,
    pub computed: String,
}

impl From<DayKeyCorrection> for FfiDayKeyCorrection {
    fn from(correction: DayKeyCorrection) -> Self {
        Self {
            record_id: correction.record_id,
            created_at: correction.created_at,
            stored: correction.stored,
            computed: correction.computed.to_string(),
        }
    }
}

/// FFI-safe audit failure.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAuditFailure {
    pub record_id: String,
    pub reason: String,
}

/// FFI-safe audit report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAuditReport {
    pub timezone: String,
    pub checked: u32,
    pub consistent: u32,
    pub corrections: Vec<FfiDayKeyCorrection>,
    pub failures: Vec<FfiAuditFailure>,
}

impl From<AuditReport> for FfiAuditReport {
    fn from(report: AuditReport) -> Self {
        Self {
            timezone: report.timezone,
            checked: report.checked as u32,
            consistent: report.consistent as u32,
            corrections: report.corrections.into_iter().map(Into::into).collect(),
            failures: report
                .failures
                .into_iter()
                .map(|f| FfiAuditFailure {
                    record_id: f.record_id,
                    reason: f.reason,
                })
                .collect(),
        }
    }
}
