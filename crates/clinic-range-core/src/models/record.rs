//! Day-scoped record models.

use serde::{Deserialize, Serialize};

/// Anything persisted with a clinic-day column alongside its creation time.
///
/// Implemented by visit, lab/imaging order and pharmacy rows in the host
/// application; the audit only needs these three fields.
pub trait DayScoped {
    /// Stable identifier used in correction reports.
    fn record_id(&self) -> &str;
    /// Creation timestamp as stored (RFC 3339, epoch millis, ...).
    fn created_at(&self) -> &str;
    /// The clinic day key currently stored, if any.
    fn stored_day_key(&self) -> Option<&str>;
}

/// Plain day-scoped row, for callers that do not have their own type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayScopedRecord {
    /// Record identifier
    pub record_id: String,
    /// Creation timestamp
    pub created_at: String,
    /// Stored clinic day key (may be missing or stale)
    pub clinic_day: Option<String>,
}

impl DayScopedRecord {
    /// Create a record with a stored key.
    pub fn new(
        record_id: impl Into<String>,
        created_at: impl Into<String>,
        clinic_day: Option<&str>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            created_at: created_at.into(),
            clinic_day: clinic_day.map(str::to_string),
        }
    }
}

impl DayScoped for DayScopedRecord {
    fn record_id(&self) -> &str {
        &self.record_id
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn stored_day_key(&self) -> Option<&str> {
        self.clinic_day.as_deref()
    }
}
