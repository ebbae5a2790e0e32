//! Builds a day's availability grid from configured price rules.
//!
//! Each configured interval is split into fixed-width buckets; a remainder
//! shorter than the granularity becomes a truncated final bucket that never
//! overruns the interval end. When a court carries more than one pricing
//! regime, only the rules matching the date's calendar classification are
//! used; a single-regime court is taken as-is.

use chrono::Duration;

use crate::error::GridError;
use crate::types::{BucketStatus, DayGrid, GridKey, PriceRule, TimeBucket, day_kind};

pub const DEFAULT_GRANULARITY_MIN: u32 = 30;

/// Build the grid for `key` from `rules`, all buckets `Available`.
///
/// Fails (and caches nothing) when the rule set is empty after regime
/// selection, malformed, or overlapping.
pub fn build_day_grid(
    key: GridKey,
    rules: &[PriceRule],
    granularity_min: u32,
) -> Result<DayGrid, GridError> {
    if granularity_min == 0 {
        return Err(GridError::InvalidRule {
            key,
            reason: "bucket granularity must be positive".to_string(),
        });
    }

    let kind = day_kind(key.date);
    let multi_regime = rules.iter().any(|r| r.day_kind.is_some());

    let mut selected: Vec<&PriceRule> = rules
        .iter()
        .filter(|r| !multi_regime || r.day_kind.is_none_or(|k| k == kind))
        .collect();

    if selected.is_empty() {
        return Err(GridError::NoPricing { key });
    }

    selected.sort_by_key(|r| r.start);

    for r in &selected {
        if r.end <= r.start {
            return Err(GridError::InvalidRule {
                key,
                reason: format!("interval {}-{} is empty or inverted", r.start, r.end),
            });
        }
    }

    for w in selected.windows(2) {
        if w[1].start < w[0].end {
            return Err(GridError::OverlappingRules {
                key,
                start: w[1].start,
            });
        }
    }

    let step = Duration::minutes(granularity_min as i64);
    let mut buckets = Vec::new();

    for rule in selected {
        let mut cur = rule.start;
        while cur < rule.end {
            let (next, wrapped) = cur.overflowing_add_signed(step);
            let end = if wrapped != 0 || next > rule.end || next <= cur {
                rule.end
            } else {
                next
            };

            buckets.push(TimeBucket {
                start: cur,
                end,
                regular_price: rule.regular_price,
                daily_price: rule.daily_price,
                student_price: rule.student_price,
                status: BucketStatus::Available,
            });

            cur = end;
        }
    }

    Ok(DayGrid { key, buckets })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DayKind;
    use chrono::{NaiveDate, NaiveTime};
    use proptest::prelude::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rule(start: NaiveTime, end: NaiveTime) -> PriceRule {
        PriceRule {
            start,
            end,
            day_kind: None,
            regular_price: 8_000,
            daily_price: 6_000,
            student_price: 4_000,
        }
    }

    fn monday_key() -> GridKey {
        GridKey::new(7, NaiveDate::from_ymd_opt(2025, 6, 9).unwrap())
    }

    fn saturday_key() -> GridKey {
        GridKey::new(7, NaiveDate::from_ymd_opt(2025, 6, 7).unwrap())
    }

    #[test]
    fn two_hour_interval_yields_four_half_hour_buckets() {
        let grid = build_day_grid(monday_key(), &[rule(hm(9, 0), hm(11, 0))], 30).unwrap();

        let starts: Vec<_> = grid.buckets.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![hm(9, 0), hm(9, 30), hm(10, 0), hm(10, 30)]);
        assert!(
            grid.buckets
                .iter()
                .all(|b| b.status == BucketStatus::Available)
        );
        assert_eq!(grid.buckets.last().unwrap().end, hm(11, 0));
    }

    #[test]
    fn remainder_bucket_truncates_to_interval_end() {
        let grid = build_day_grid(monday_key(), &[rule(hm(9, 0), hm(10, 45))], 30).unwrap();

        let last = grid.buckets.last().unwrap();
        assert_eq!(last.start, hm(10, 30));
        assert_eq!(last.end, hm(10, 45));
        assert_eq!(grid.buckets.len(), 4);
    }

    #[test]
    fn weekend_date_selects_weekend_regime() {
        let mut weekday = rule(hm(9, 0), hm(10, 0));
        weekday.day_kind = Some(DayKind::Weekday);
        let mut weekend = rule(hm(14, 0), hm(15, 0));
        weekend.day_kind = Some(DayKind::Weekend);

        let grid = build_day_grid(saturday_key(), &[weekday, weekend], 30).unwrap();

        assert_eq!(grid.buckets.len(), 2);
        assert_eq!(grid.buckets[0].start, hm(14, 0));
    }

    #[test]
    fn all_day_rules_survive_regime_selection() {
        let mut weekend = rule(hm(14, 0), hm(15, 0));
        weekend.day_kind = Some(DayKind::Weekend);
        let everyday = rule(hm(9, 0), hm(10, 0));

        let grid = build_day_grid(saturday_key(), &[weekend, everyday], 30).unwrap();

        let starts: Vec<_> = grid.buckets.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![hm(9, 0), hm(9, 30), hm(14, 0), hm(14, 30)]);
    }

    #[test]
    fn single_regime_is_not_filtered() {
        let grid = build_day_grid(saturday_key(), &[rule(hm(9, 0), hm(10, 0))], 30).unwrap();
        assert_eq!(grid.buckets.len(), 2);
    }

    #[test]
    fn empty_rule_set_is_a_configuration_error() {
        let err = build_day_grid(monday_key(), &[], 30).unwrap_err();
        assert!(matches!(err, GridError::NoPricing { .. }));
    }

    #[test]
    fn regime_filtering_to_nothing_is_a_configuration_error() {
        let mut weekday = rule(hm(9, 0), hm(10, 0));
        weekday.day_kind = Some(DayKind::Weekday);

        let err = build_day_grid(saturday_key(), &[weekday], 30).unwrap_err();
        assert!(matches!(err, GridError::NoPricing { .. }));
    }

    #[test]
    fn overlapping_rules_abort_the_build() {
        let err = build_day_grid(
            monday_key(),
            &[rule(hm(9, 0), hm(11, 0)), rule(hm(10, 30), hm(12, 0))],
            30,
        )
        .unwrap_err();
        assert!(matches!(err, GridError::OverlappingRules { .. }));
    }

    #[test]
    fn inverted_interval_abort_the_build() {
        let err = build_day_grid(monday_key(), &[rule(hm(11, 0), hm(9, 0))], 30).unwrap_err();
        assert!(matches!(err, GridError::InvalidRule { .. }));
    }

    #[test]
    fn zero_granularity_is_rejected() {
        let err = build_day_grid(monday_key(), &[rule(hm(9, 0), hm(11, 0))], 0).unwrap_err();
        assert!(matches!(err, GridError::InvalidRule { .. }));
    }

    proptest! {
        // Buckets must tile the configured intervals exactly: same total
        // minutes, sorted, non-overlapping, each bucket inside one rule.
        #[test]
        fn buckets_tile_configured_intervals(
            segments in prop::collection::vec((0u32..=120, 30u32..=180), 1..4)
        ) {
            let mut cursor = 7 * 60;
            let mut rules = Vec::new();
            for (gap, len) in segments {
                let start_min = cursor + gap;
                let end_min = start_min + len;
                if end_min >= 24 * 60 {
                    break;
                }
                rules.push(rule(
                    hm(start_min / 60, start_min % 60),
                    hm(end_min / 60, end_min % 60),
                ));
                cursor = end_min;
            }
            prop_assume!(!rules.is_empty());

            let grid = build_day_grid(monday_key(), &rules, 30).unwrap();

            let covered: i64 = grid
                .buckets
                .iter()
                .map(|b| (b.end - b.start).num_minutes())
                .sum();
            let configured: i64 = rules
                .iter()
                .map(|r| (r.end - r.start).num_minutes())
                .sum();
            prop_assert_eq!(covered, configured);

            for w in grid.buckets.windows(2) {
                prop_assert!(w[0].end <= w[1].start);
            }
            for b in &grid.buckets {
                prop_assert!((b.end - b.start).num_minutes() <= 30);
                prop_assert!(rules.iter().any(|r| r.start <= b.start && b.end <= r.end));
            }
        }
    }
}
