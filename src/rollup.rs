//! Aggregation rollup validation
//!
//! Consumes pre-computed period rows from the aggregation cache and turns
//! them into weekly/monthly bedtime/waketime averages. Validation is strict:
//! a period missing either metric, carrying duplicates, or holding an
//! unparseable time value is dropped whole. Averaging over an incomplete set
//! of source days would silently bias the displayed times; the contract is
//! complete data or nothing.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::store::AggregateCache;
use crate::types::{
    AggregatedPeriod, CalculationType, PeriodAverage, PeriodType, SleepMetric, TimeRange,
};

/// Parses a cache wall-clock value (`"HH:MM"` or `"HH:MM:SS"`) into a
/// time of day. Empty and malformed strings yield `None`.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()
}

/// Validates a batch of cache rows into per-period bedtime/waketime averages,
/// ordered by period start.
///
/// Rows are grouped by the UTC calendar day of `period_start`. A group is
/// emitted only when it holds exactly one bedtime row and exactly one
/// waketime row, both with a parseable time value; anything else is logged
/// and dropped. Sparse cache data is expected, so drops are not errors.
pub fn validate_period_averages(
    rows: &[AggregatedPeriod],
    period_type: PeriodType,
) -> Result<Vec<PeriodAverage>, EngineError> {
    let mut by_period: BTreeMap<NaiveDate, Vec<&AggregatedPeriod>> = BTreeMap::new();
    for row in rows {
        if row.period_type != period_type {
            continue;
        }
        by_period
            .entry(row.period_start.date_naive())
            .or_default()
            .push(row);
    }

    let mut averages = Vec::new();
    for (period_start, group) in by_period {
        let bedtimes: Vec<&AggregatedPeriod> = group
            .iter()
            .copied()
            .filter(|r| r.metric == SleepMetric::Bedtime)
            .collect();
        let waketimes: Vec<&AggregatedPeriod> = group
            .iter()
            .copied()
            .filter(|r| r.metric == SleepMetric::Waketime)
            .collect();

        let (bedtime_row, waketime_row) = match (&bedtimes[..], &waketimes[..]) {
            ([b], [w]) => (*b, *w),
            _ => {
                warn!(
                    period = %period_start,
                    bedtime_rows = bedtimes.len(),
                    waketime_rows = waketimes.len(),
                    "dropping period without exactly one bedtime and one waketime row"
                );
                continue;
            }
        };

        let parsed = bedtime_row
            .value_time
            .as_deref()
            .and_then(parse_time_of_day)
            .zip(waketime_row.value_time.as_deref().and_then(parse_time_of_day));
        let Some((avg_bedtime, avg_waketime)) = parsed else {
            warn!(period = %period_start, "dropping period with missing or malformed time value");
            continue;
        };

        let period_end = resolve_period_end(
            period_start,
            bedtime_row.period_end.date_naive(),
            period_type,
        )?;

        averages.push(PeriodAverage {
            period_start,
            period_end,
            avg_bedtime,
            avg_waketime,
        });
    }

    debug!(
        periods = averages.len(),
        period_type = ?period_type,
        "validated rollup periods"
    );
    Ok(averages)
}

/// Fetches bedtime/waketime rows for a range from the aggregation cache and
/// validates them into period averages.
pub async fn load_period_averages(
    cache: &dyn AggregateCache,
    period_type: PeriodType,
    range: TimeRange,
) -> Result<Vec<PeriodAverage>, EngineError> {
    let rows = cache
        .fetch_aggregated_periods(
            &[SleepMetric::Bedtime, SleepMetric::Waketime],
            period_type,
            CalculationType::Avg,
            range,
        )
        .await?;
    validate_period_averages(&rows, period_type)
}

/// Average time-in-bed and time-asleep, in minutes, over the days of a
/// visible window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationAverages {
    pub avg_time_in_bed_minutes: f64,
    pub avg_time_asleep_minutes: f64,
}

/// Averages daily duration rows across a window. Only days carrying both a
/// time-in-bed and a time-asleep value contribute; a window with no such day
/// yields `None`.
pub fn window_duration_averages(rows: &[AggregatedPeriod]) -> Option<DurationAverages> {
    let mut by_day: BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for row in rows {
        let entry = by_day.entry(row.period_start.date_naive()).or_default();
        match row.metric {
            SleepMetric::TimeInBed => entry.0 = row.value,
            SleepMetric::TimeAsleep => entry.1 = row.value,
            SleepMetric::Bedtime | SleepMetric::Waketime => {}
        }
    }

    let complete: Vec<(f64, f64)> = by_day
        .values()
        .filter_map(|(in_bed, asleep)| in_bed.zip(*asleep))
        .collect();
    if complete.is_empty() {
        return None;
    }

    let count = complete.len() as f64;
    Some(DurationAverages {
        avg_time_in_bed_minutes: complete.iter().map(|(b, _)| b).sum::<f64>() / count,
        avg_time_asleep_minutes: complete.iter().map(|(_, a)| a).sum::<f64>() / count,
    })
}

/// The calendar end of a period. The cache row's own end wins when it lies
/// after the start; degenerate rows fall back to the period type's natural
/// span.
fn resolve_period_end(
    start: NaiveDate,
    row_end: NaiveDate,
    period_type: PeriodType,
) -> Result<NaiveDate, EngineError> {
    if row_end > start {
        return Ok(row_end);
    }
    match period_type {
        PeriodType::Daily => Ok(start),
        PeriodType::Weekly => start
            .checked_add_days(chrono::Days::new(6))
            .ok_or_else(|| EngineError::DateArithmetic(format!("no week end after {start}"))),
        PeriodType::Monthly => last_day_of_month(start),
    }
}

fn last_day_of_month(date: NaiveDate) -> Result<NaiveDate, EngineError> {
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .ok_or_else(|| EngineError::DateArithmetic(format!("no month end for {date}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CalculationType;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn day_start(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn time_row(
        metric: SleepMetric,
        period_type: PeriodType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        value_time: Option<&str>,
    ) -> AggregatedPeriod {
        AggregatedPeriod {
            metric,
            period_type,
            calculation: CalculationType::Avg,
            period_start: start,
            period_end: end,
            value: None,
            value_time: value_time.map(str::to_owned),
        }
    }

    fn duration_row(metric: SleepMetric, start: DateTime<Utc>, value: Option<f64>) -> AggregatedPeriod {
        AggregatedPeriod {
            metric,
            period_type: PeriodType::Daily,
            calculation: CalculationType::Avg,
            period_start: start,
            period_end: start,
            value,
            value_time: None,
        }
    }

    #[test]
    fn test_parse_time_of_day_variants() {
        assert_eq!(
            parse_time_of_day("23:15"),
            NaiveTime::from_hms_opt(23, 15, 0)
        );
        assert_eq!(
            parse_time_of_day("06:30:45"),
            NaiveTime::from_hms_opt(6, 30, 45)
        );
        assert_eq!(parse_time_of_day(""), None);
        assert_eq!(parse_time_of_day("   "), None);
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("bedtime"), None);
    }

    #[test]
    fn test_complete_week_is_emitted() {
        let rows = vec![
            time_row(
                SleepMetric::Bedtime,
                PeriodType::Weekly,
                day_start(4),
                day_start(10),
                Some("23:15"),
            ),
            time_row(
                SleepMetric::Waketime,
                PeriodType::Weekly,
                day_start(4),
                day_start(10),
                Some("07:05:30"),
            ),
        ];

        let averages = validate_period_averages(&rows, PeriodType::Weekly).unwrap();
        assert_eq!(averages.len(), 1);
        assert_eq!(
            averages[0].period_start,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        assert_eq!(
            averages[0].period_end,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
        assert_eq!(averages[0].avg_bedtime, NaiveTime::from_hms_opt(23, 15, 0).unwrap());
        assert_eq!(
            averages[0].avg_waketime,
            NaiveTime::from_hms_opt(7, 5, 30).unwrap()
        );
    }

    #[test]
    fn test_bedtime_only_period_is_dropped() {
        // A valid bedtime with no waketime counterpart never surfaces
        let rows = vec![time_row(
            SleepMetric::Bedtime,
            PeriodType::Weekly,
            day_start(4),
            day_start(10),
            Some("23:15"),
        )];
        assert!(validate_period_averages(&rows, PeriodType::Weekly)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_duplicate_metric_row_drops_period() {
        let rows = vec![
            time_row(
                SleepMetric::Bedtime,
                PeriodType::Weekly,
                day_start(4),
                day_start(10),
                Some("23:15"),
            ),
            time_row(
                SleepMetric::Bedtime,
                PeriodType::Weekly,
                day_start(4),
                day_start(10),
                Some("23:45"),
            ),
            time_row(
                SleepMetric::Waketime,
                PeriodType::Weekly,
                day_start(4),
                day_start(10),
                Some("07:00"),
            ),
        ];
        assert!(validate_period_averages(&rows, PeriodType::Weekly)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_time_value_drops_period() {
        let rows = vec![
            time_row(
                SleepMetric::Bedtime,
                PeriodType::Weekly,
                day_start(4),
                day_start(10),
                Some(""),
            ),
            time_row(
                SleepMetric::Waketime,
                PeriodType::Weekly,
                day_start(4),
                day_start(10),
                Some("07:00"),
            ),
        ];
        assert!(validate_period_averages(&rows, PeriodType::Weekly)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dropped_period_does_not_affect_neighbors() {
        let mut rows = vec![time_row(
            SleepMetric::Bedtime,
            PeriodType::Weekly,
            day_start(4),
            day_start(10),
            Some("23:15"),
        )];
        rows.push(time_row(
            SleepMetric::Bedtime,
            PeriodType::Weekly,
            day_start(11),
            day_start(17),
            Some("22:50"),
        ));
        rows.push(time_row(
            SleepMetric::Waketime,
            PeriodType::Weekly,
            day_start(11),
            day_start(17),
            Some("06:40"),
        ));

        let averages = validate_period_averages(&rows, PeriodType::Weekly).unwrap();
        assert_eq!(averages.len(), 1);
        assert_eq!(
            averages[0].period_start,
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
        );
    }

    #[test]
    fn test_degenerate_monthly_end_falls_back_to_month_span() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let rows = vec![
            time_row(SleepMetric::Bedtime, PeriodType::Monthly, start, start, Some("23:00")),
            time_row(SleepMetric::Waketime, PeriodType::Monthly, start, start, Some("07:00")),
        ];

        let averages = validate_period_averages(&rows, PeriodType::Monthly).unwrap();
        assert_eq!(
            averages[0].period_end,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_mismatched_period_type_rows_ignored() {
        let rows = vec![
            time_row(
                SleepMetric::Bedtime,
                PeriodType::Monthly,
                day_start(1),
                day_start(31),
                Some("23:00"),
            ),
            time_row(
                SleepMetric::Waketime,
                PeriodType::Monthly,
                day_start(1),
                day_start(31),
                Some("07:00"),
            ),
        ];
        assert!(validate_period_averages(&rows, PeriodType::Weekly)
            .unwrap()
            .is_empty());
    }

    struct FixtureCache {
        rows: Vec<AggregatedPeriod>,
    }

    #[async_trait::async_trait]
    impl AggregateCache for FixtureCache {
        async fn fetch_aggregated_periods(
            &self,
            metrics: &[SleepMetric],
            period_type: PeriodType,
            _calculation: CalculationType,
            range: TimeRange,
        ) -> Result<Vec<AggregatedPeriod>, EngineError> {
            Ok(self
                .rows
                .iter()
                .filter(|r| {
                    metrics.contains(&r.metric)
                        && r.period_type == period_type
                        && range.contains(r.period_start)
                })
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_load_period_averages_fetches_and_validates() {
        let cache = FixtureCache {
            rows: vec![
                time_row(
                    SleepMetric::Bedtime,
                    PeriodType::Weekly,
                    day_start(4),
                    day_start(10),
                    Some("23:15"),
                ),
                time_row(
                    SleepMetric::Waketime,
                    PeriodType::Weekly,
                    day_start(4),
                    day_start(10),
                    Some("07:05"),
                ),
                // Incomplete second week, dropped by validation
                time_row(
                    SleepMetric::Bedtime,
                    PeriodType::Weekly,
                    day_start(11),
                    day_start(17),
                    Some("22:40"),
                ),
            ],
        };

        let range = TimeRange::new(day_start(1), day_start(31));
        let averages = load_period_averages(&cache, PeriodType::Weekly, range)
            .await
            .unwrap();
        assert_eq!(averages.len(), 1);
        assert_eq!(
            averages[0].period_start,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
    }

    #[test]
    fn test_window_duration_averages_skip_partial_days() {
        let rows = vec![
            duration_row(SleepMetric::TimeInBed, day_start(10), Some(420.0)),
            duration_row(SleepMetric::TimeAsleep, day_start(10), Some(410.0)),
            duration_row(SleepMetric::TimeInBed, day_start(11), Some(480.0)),
            duration_row(SleepMetric::TimeAsleep, day_start(11), Some(450.0)),
            // day 12 has time-in-bed only and must not contribute
            duration_row(SleepMetric::TimeInBed, day_start(12), Some(600.0)),
        ];

        let averages = window_duration_averages(&rows).unwrap();
        assert_eq!(averages.avg_time_in_bed_minutes, 450.0);
        assert_eq!(averages.avg_time_asleep_minutes, 430.0);
    }

    #[test]
    fn test_window_duration_averages_no_complete_day() {
        let rows = vec![duration_row(SleepMetric::TimeInBed, day_start(10), Some(420.0))];
        assert_eq!(window_duration_averages(&rows), None);
    }
}
