//! Day-key audit for persisted day-scoped records.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::RangeEngine;
use crate::models::{ClinicDayKey, DayScoped};

/// A record whose stored clinic day disagrees with its creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayKeyCorrection {
    /// Record identifier
    pub record_id: String,
    /// Creation timestamp as stored
    pub created_at: String,
    /// Stored key (missing, malformed, or wrong)
    pub stored: Option<String>,
    /// Key recomputed from `created_at`
    pub computed: ClinicDayKey,
}

/// A record the audit could not evaluate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditFailure {
    /// Record identifier
    pub record_id: String,
    /// Why the record was skipped
    pub reason: String,
}

/// Outcome of auditing a batch of records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditReport {
    /// Clinic timezone the keys were computed in
    pub timezone: String,
    /// Records examined
    pub checked: usize,
    /// Records whose stored key was already correct
    pub consistent: usize,
    /// Records needing a new key
    pub corrections: Vec<DayKeyCorrection>,
    /// Records with unparseable or out-of-range timestamps
    pub failures: Vec<AuditFailure>,
}

impl AuditReport {
    /// Whether every record was consistent.
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty() && self.failures.is_empty()
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export corrections as CSV for the migration job.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("record_id,created_at,stored_day_key,computed_day_key\n");

        for item in &self.corrections {
            csv.push_str(&format!(
                "{},{},{},{}\n",
                escape_csv(&item.record_id),
                escape_csv(&item.created_at),
                escape_csv(item.stored.as_deref().unwrap_or("")),
                item.computed,
            ));
        }

        csv
    }
}

/// Recomputes stored clinic days from creation timestamps.
pub struct DayKeyAuditor<'a> {
    engine: &'a RangeEngine,
}

impl<'a> DayKeyAuditor<'a> {
    /// Create an auditor on an engine.
    pub fn new(engine: &'a RangeEngine) -> Self {
        Self { engine }
    }

    /// Audit a batch of records.
    ///
    /// Unparseable `created_at` values, and instants outside the key range,
    /// are reported as failures and never assigned a guessed key.
    pub fn audit<'r, R, I>(&self, records: I) -> AuditReport
    where
        R: DayScoped + 'r,
        I: IntoIterator<Item = &'r R>,
    {
        let mut report = AuditReport {
            timezone: self.engine.timezone().to_string(),
            checked: 0,
            consistent: 0,
            corrections: Vec::new(),
            failures: Vec::new(),
        };

        for record in records {
            report.checked += 1;

            let computed = match self.engine.day_key_of_str(record.created_at()) {
                Ok(key) => key,
                Err(e) => {
                    warn!(
                        record_id = record.record_id(),
                        error = %e,
                        "Skipping record without a clinic day"
                    );
                    report.failures.push(AuditFailure {
                        record_id: record.record_id().to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let stored = record.stored_day_key();
            let matches = stored
                .and_then(|s| ClinicDayKey::parse(s).ok())
                .is_some_and(|key| key == computed);

            if matches {
                report.consistent += 1;
            } else {
                report.corrections.push(DayKeyCorrection {
                    record_id: record.record_id().to_string(),
                    created_at: record.created_at().to_string(),
                    stored: stored.map(str::to_string),
                    computed,
                });
            }
        }

        info!(
            checked = report.checked,
            corrections = report.corrections.len(),
            failures = report.failures.len(),
            "Day-key audit complete"
        );
        report
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
