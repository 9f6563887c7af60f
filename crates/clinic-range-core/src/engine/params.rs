//! Query parameter codec for resolved ranges.
//!
//! Wire form: `preset=<name>` plus, for every bounded range, `from` and `to`
//! day keys with `to` inclusive. Carrying the concrete days keeps cache keys
//! from surviving a midnight rollover and lets a receiver filter without
//! consulting its own clock.

use crate::models::{ClinicDayKey, QueryParams, RangePreset, RangeSpec, ResolvedRange};

use super::{RangeEngine, RangeError, RangeResult};

pub const PARAM_PRESET: &str = "preset";
pub const PARAM_FROM: &str = "from";
pub const PARAM_TO: &str = "to";

/// Flatten a range (or "all") into request parameters.
pub fn serialize_range_params(range: Option<&ResolvedRange>) -> QueryParams {
    let mut params = QueryParams::new();
    match range {
        None => {
            params.insert(PARAM_PRESET.into(), RangePreset::All.as_str().into());
        }
        Some(range) => {
            params.insert(PARAM_PRESET.into(), range.preset.as_str().into());
            params.insert(PARAM_FROM.into(), range.start_day_key.to_string());
            params.insert(PARAM_TO.into(), range.last_day_key().to_string());
        }
    }
    params
}

/// Stable cache key: parameters rendered as `k=v&k=v` in key order.
pub fn cache_key(range: Option<&ResolvedRange>) -> String {
    serialize_range_params(range)
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

impl RangeEngine {
    /// Rebuild a range from request parameters.
    ///
    /// Explicit `from`/`to` win over the preset's relative meaning, so a
    /// request built before midnight still filters the days it was built for.
    /// The days must still span the preset's length. A lone `from` or `to` is
    /// [`RangeError::MissingRangeBound`] for every preset, and a missing or
    /// unknown `preset` is [`RangeError::UnknownPreset`].
    pub fn parse_range_params(&self, params: &QueryParams) -> RangeResult<Option<ResolvedRange>> {
        let raw_preset = params.get(PARAM_PRESET).map(String::as_str).unwrap_or("");
        let preset = RangePreset::parse(raw_preset)?;

        if preset == RangePreset::All {
            return Ok(None);
        }

        let bound = |name: &str| -> RangeResult<Option<ClinicDayKey>> {
            match params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                Some(value) => ClinicDayKey::parse(value).map(Some),
                None => Ok(None),
            }
        };

        match (bound(PARAM_FROM)?, bound(PARAM_TO)?) {
            (Some(from), Some(to)) => {
                let (start, end) = self.custom_days(from.into(), to.into())?;
                if let Some((_, expected)) = preset.relative_window() {
                    let actual = start.days_until(&end);
                    if actual != expected {
                        return Err(RangeError::PresetSpanMismatch {
                            preset: preset.to_string(),
                            expected,
                            actual,
                        });
                    }
                }
                self.build_range(preset, start, end).map(Some)
            }
            (Some(_), None) => Err(RangeError::MissingRangeBound(PARAM_TO)),
            (None, Some(_)) => Err(RangeError::MissingRangeBound(PARAM_FROM)),
            (None, None) => self.resolve_range(&RangeSpec::from_preset(preset)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClinicTimezone;
    use crate::engine::FixedClock;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn engine_at(now: &str) -> RangeEngine {
        RangeEngine::with_clock(
            ClinicTimezone::default(),
            Arc::new(FixedClock::new(utc(now))),
        )
    }

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_serialize_all() {
        assert_eq!(serialize_range_params(None), params(&[("preset", "all")]));
        assert_eq!(cache_key(None), "preset=all");
    }

    #[test]
    fn test_serialize_last7_includes_days() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        let range = engine.resolve_range(&RangeSpec::Last7).unwrap();

        assert_eq!(
            serialize_range_params(range.as_ref()),
            params(&[("preset", "last7"), ("from", "2025-11-03"), ("to", "2025-11-09")])
        );
        assert_eq!(
            cache_key(range.as_ref()),
            "from=2025-11-03&preset=last7&to=2025-11-09"
        );
    }

    #[test]
    fn test_today_and_yesterday_keys_differ() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        let today = engine.resolve_range(&RangeSpec::Today).unwrap();
        let yesterday = engine.resolve_range(&RangeSpec::Yesterday).unwrap();
        assert_ne!(cache_key(today.as_ref()), cache_key(yesterday.as_ref()));

        // Same concrete day through a custom range still keys differently
        let custom = engine
            .resolve_range(&RangeSpec::custom_days("2025-11-09", "2025-11-09").unwrap())
            .unwrap();
        assert_ne!(cache_key(today.as_ref()), cache_key(custom.as_ref()));
    }

    #[test]
    fn test_cache_key_rolls_over_at_midnight() {
        let before = engine_at("2025-11-09T21:59:59Z");
        let after = engine_at("2025-11-09T22:00:00Z");
        let a = before.resolve_range(&RangeSpec::Today).unwrap();
        let b = after.resolve_range(&RangeSpec::Today).unwrap();
        assert_ne!(cache_key(a.as_ref()), cache_key(b.as_ref()));
    }

    #[test]
    fn test_round_trip_every_preset() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        let specs = [
            RangeSpec::Today,
            RangeSpec::Yesterday,
            RangeSpec::Last7,
            RangeSpec::Last30,
            RangeSpec::All,
            RangeSpec::custom_days("2025-10-01", "2025-10-31").unwrap(),
        ];

        for spec in specs {
            let range = engine.resolve_range(&spec).unwrap();
            let wire = serialize_range_params(range.as_ref());
            assert_eq!(engine.parse_range_params(&wire).unwrap(), range, "{:?}", spec);
        }
    }

    #[test]
    fn test_explicit_days_win_over_receiver_clock() {
        let sender = engine_at("2025-11-09T08:00:00Z");
        let receiver = engine_at("2025-11-10T08:00:00Z");

        let range = sender.resolve_range(&RangeSpec::Last7).unwrap();
        let wire = serialize_range_params(range.as_ref());
        assert_eq!(receiver.parse_range_params(&wire).unwrap(), range);
    }

    #[test]
    fn test_parse_relative_preset_without_days() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        let range = engine
            .parse_range_params(&params(&[("preset", "Yesterday")]))
            .unwrap()
            .unwrap();
        assert_eq!(range.preset, RangePreset::Yesterday);
        assert_eq!(range.start_day_key.to_string(), "2025-11-08");
    }

    #[test]
    fn test_parse_custom_missing_bound() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        assert_eq!(
            engine.parse_range_params(&params(&[("preset", "custom"), ("from", "2025-11-01")])),
            Err(RangeError::MissingRangeBound("to"))
        );
        assert_eq!(
            engine.parse_range_params(&params(&[("preset", "custom"), ("to", ""), ("from", "2025-11-01")])),
            Err(RangeError::MissingRangeBound("to"))
        );
    }

    #[test]
    fn test_parse_lone_bound_with_relative_preset() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        assert_eq!(
            engine.parse_range_params(&params(&[("preset", "last7"), ("from", "2025-01-01")])),
            Err(RangeError::MissingRangeBound("to"))
        );
        assert_eq!(
            engine.parse_range_params(&params(&[("preset", "today"), ("to", "2025-11-09")])),
            Err(RangeError::MissingRangeBound("from"))
        );
    }

    #[test]
    fn test_parse_days_must_match_preset_span() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        assert_eq!(
            engine.parse_range_params(&params(&[
                ("preset", "today"),
                ("from", "2025-11-01"),
                ("to", "2025-11-30"),
            ])),
            Err(RangeError::PresetSpanMismatch {
                preset: "today".into(),
                expected: 1,
                actual: 30,
            })
        );
        assert!(matches!(
            engine.parse_range_params(&params(&[
                ("preset", "last30"),
                ("from", "2025-11-03"),
                ("to", "2025-11-09"),
            ])),
            Err(RangeError::PresetSpanMismatch { expected: 30, actual: 7, .. })
        ));

        // Right length, any days: the sender's days are kept
        let range = engine
            .parse_range_params(&params(&[
                ("preset", "last7"),
                ("from", "2025-10-01"),
                ("to", "2025-10-07"),
            ]))
            .unwrap()
            .unwrap();
        assert_eq!(range.preset, RangePreset::Last7);
        assert_eq!(range.day_count(), 7);
        assert_eq!(range.start_day_key.to_string(), "2025-10-01");
    }

    #[test]
    fn test_parse_rejects_unknown_or_missing_preset() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        assert!(matches!(
            engine.parse_range_params(&params(&[("preset", "fortnight")])),
            Err(RangeError::UnknownPreset(_))
        ));
        assert!(matches!(
            engine.parse_range_params(&params(&[("from", "2025-11-01"), ("to", "2025-11-02")])),
            Err(RangeError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_day_keys() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        assert!(matches!(
            engine.parse_range_params(&params(&[
                ("preset", "custom"),
                ("from", "2025-02-30"),
                ("to", "2025-03-02"),
            ])),
            Err(RangeError::InvalidDayKey(_))
        ));
    }

    #[test]
    fn test_parse_all_ignores_days() {
        let engine = engine_at("2025-11-09T08:00:00Z");
        assert_eq!(
            engine
                .parse_range_params(&params(&[("preset", "ALL"), ("from", "2025-11-01")]))
                .unwrap(),
            None
        );
    }
}
