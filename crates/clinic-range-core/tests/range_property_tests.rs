//! Property tests for the day-key codec and range resolution.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clinic_range_core::{
    serialize_range_params, ClinicDayKey, ClinicTimezone, FixedClock, QueryParams, RangeEngine,
    RangeError, RangeSpec,
};
use proptest::prelude::*;

/// 1900-01-01 .. 2200-01-01 in epoch milliseconds.
const MIN_MILLIS: i64 = -2_208_988_800_000;
const MAX_MILLIS: i64 = 7_258_118_400_000;

fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (MIN_MILLIS..MAX_MILLIS).prop_map(|ms| Utc.timestamp_millis_opt(ms).unwrap())
}

fn day_key() -> impl Strategy<Value = ClinicDayKey> {
    (0i64..109_500).prop_map(|days| {
        let base = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        ClinicDayKey::from_date(base + Duration::days(days)).unwrap()
    })
}

/// Whole-minute offsets between UTC-12 and UTC+14.
fn timezone() -> impl Strategy<Value = ClinicTimezone> {
    (-12 * 60..=14 * 60i32)
        .prop_map(|minutes| ClinicTimezone::fixed("Test/Zone", minutes * 60).unwrap())
}

fn engine_at(tz: ClinicTimezone, now: DateTime<Utc>) -> RangeEngine {
    RangeEngine::with_clock(tz, Arc::new(FixedClock::new(now)))
}

proptest! {
    #[test]
    fn day_range_contains_its_instant(t in instant(), tz in timezone()) {
        let engine = RangeEngine::new(tz);
        let range = engine.day_range(engine.day_key(t).unwrap()).unwrap();
        prop_assert!(engine.in_range(t, Some(&range)));
    }

    #[test]
    fn day_range_start_maps_back_to_key(k in day_key(), tz in timezone()) {
        let engine = RangeEngine::new(tz);
        let range = engine.day_key_to_range(&k.to_string()).unwrap();
        prop_assert_eq!(engine.day_key(range.start_utc).unwrap(), k);
        prop_assert_eq!(engine.day_key(range.end_utc - Duration::milliseconds(1)).unwrap(), k);
    }

    #[test]
    fn day_key_text_round_trips(k in day_key()) {
        prop_assert_eq!(ClinicDayKey::parse(&k.to_string()).unwrap(), k);
    }

    #[test]
    fn same_key_iff_same_local_day(a in instant(), b in instant(), tz in timezone()) {
        let engine = RangeEngine::new(tz.clone());
        let same_local_date = a.with_timezone(&tz.offset()).date_naive()
            == b.with_timezone(&tz.offset()).date_naive();
        prop_assert_eq!(engine.day_key(a).unwrap() == engine.day_key(b).unwrap(), same_local_date);
    }

    #[test]
    fn presets_span_expected_days(now in instant(), tz in timezone()) {
        let engine = engine_at(tz, now);
        let today = engine.day_key(now).unwrap();

        for (spec, days) in [
            (RangeSpec::Today, 1),
            (RangeSpec::Yesterday, 1),
            (RangeSpec::Last7, 7),
            (RangeSpec::Last30, 30),
        ] {
            let range = engine.resolve_range(&spec).unwrap().unwrap();
            prop_assert_eq!(range.day_count(), days);
            prop_assert_eq!(range.day_keys().count() as i64, days);
            prop_assert!(range.start_utc < range.end_utc);
            prop_assert_eq!(range.end_utc - range.start_utc, Duration::days(days));
            prop_assert_eq!(engine.day_key(range.start_utc).unwrap(), range.start_day_key);
        }

        let today_range = engine.resolve_range(&RangeSpec::Today).unwrap().unwrap();
        prop_assert_eq!(today_range.start_day_key, today);
        prop_assert!(today_range.contains(now));

        let week = engine.resolve_range(&RangeSpec::Last7).unwrap().unwrap();
        prop_assert_eq!(week.last_day_key(), today);
    }

    #[test]
    fn half_open_at_end(now in instant(), tz in timezone()) {
        let engine = engine_at(tz, now);
        let range = engine.resolve_range(&RangeSpec::Last7).unwrap().unwrap();
        prop_assert!(!engine.in_range(range.end_utc, Some(&range)));
        prop_assert!(engine.in_range(range.end_utc - Duration::milliseconds(1), Some(&range)));
        prop_assert!(engine.in_range(range.start_utc, Some(&range)));
    }

    #[test]
    fn resolution_is_idempotent(now in instant()) {
        let engine = engine_at(ClinicTimezone::default(), now);
        for spec in [RangeSpec::Today, RangeSpec::Yesterday, RangeSpec::Last7, RangeSpec::Last30] {
            prop_assert_eq!(engine.resolve_range(&spec).unwrap(), engine.resolve_range(&spec).unwrap());
        }
    }

    #[test]
    fn custom_range_counts_inclusive_days(a in day_key(), len in 0i64..400) {
        let engine = RangeEngine::default();
        let b = a.add_days(len).unwrap();
        let range = engine.resolve_range(&RangeSpec::custom(a, b)).unwrap().unwrap();
        prop_assert_eq!(range.day_count(), len + 1);
        prop_assert_eq!(range.start_day_key, a);
        prop_assert_eq!(range.last_day_key(), b);
    }

    #[test]
    fn params_round_trip(now in instant(), a in day_key(), len in 0i64..60) {
        let sender = engine_at(ClinicTimezone::default(), now);
        let receiver = engine_at(ClinicTimezone::default(), now + Duration::days(3));
        let b = a.add_days(len).unwrap();

        for spec in [RangeSpec::Today, RangeSpec::Last30, RangeSpec::custom(a, b)] {
            let range = sender.resolve_range(&spec).unwrap();
            let params = serialize_range_params(range.as_ref());
            prop_assert_eq!(receiver.parse_range_params(&params).unwrap(), range);
        }
    }

    #[test]
    fn relative_preset_params_keep_their_span(a in day_key(), len in 0i64..60) {
        let engine = RangeEngine::default();
        let from = a.to_string();
        let to = a.add_days(len).unwrap().to_string();

        for (preset, days) in [("today", 1), ("yesterday", 1), ("last7", 7), ("last30", 30)] {
            let params: QueryParams = [("preset", preset), ("from", from.as_str()), ("to", to.as_str())]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let parsed = engine.parse_range_params(&params);
            if len + 1 == days {
                prop_assert_eq!(parsed.unwrap().unwrap().day_count(), days);
            } else {
                let is_span_mismatch = matches!(parsed, Err(RangeError::PresetSpanMismatch { .. }));
                prop_assert!(is_span_mismatch);
            }
        }
    }
}
