//! Time-bucketed aggregation of daily activity records
//!
//! Records are folded into day, week or month buckets. Independent users
//! can be aggregated in parallel with rayon.

use crate::{ActivityRecord, Bucket, BucketKey, Granularity};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Weekday};
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Number of most recent records shown by the daily view.
pub const DEFAULT_DAILY_WINDOW: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// A record's date is missing or not a calendar date.
    #[error("record {index} has invalid date '{date}': {reason}")]
    Validation {
        index: usize,
        date: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Weekday that opens each weekly bucket.
    pub week_start: Weekday,
    pub daily_window: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
            daily_window: DEFAULT_DAILY_WINDOW,
        }
    }
}

/// Aggregate records into chronologically ordered buckets with Sunday-based
/// weeks and a 30 record daily window.
pub fn aggregate(
    records: &[ActivityRecord],
    granularity: Granularity,
) -> Result<Vec<Bucket>, AggregateError> {
    aggregate_with(records, granularity, &AggregateOptions::default())
}

pub fn aggregate_with(
    records: &[ActivityRecord],
    granularity: Granularity,
    options: &AggregateOptions,
) -> Result<Vec<Bucket>, AggregateError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let mut dated = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            parse_activity_date(&record.date)
                .map(|date| (date, index, record))
                .map_err(|reason| AggregateError::Validation {
                    index,
                    date: record.date.clone(),
                    reason,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Stable: records sharing a date keep their input order
    dated.sort_by_key(|(date, _, _)| *date);

    let buckets = match granularity {
        Granularity::Daily => daily_buckets(&dated, options.daily_window),
        Granularity::Weekly => grouped_buckets(&dated, |date| {
            week_anchor(date, options.week_start).map(BucketKey::Week)
        })?,
        Granularity::Monthly => grouped_buckets(&dated, |date| {
            Some(BucketKey::Month {
                year: date.year(),
                month: date.month(),
            })
        })?,
    };

    debug!(
        records = records.len(),
        buckets = buckets.len(),
        %granularity,
        "aggregated activity records"
    );

    Ok(buckets)
}

/// Aggregate several users' histories in parallel.
///
/// Each user succeeds or fails on its own; one bad record does not affect
/// other users.
pub fn aggregate_by_user(
    records_by_user: &BTreeMap<i64, Vec<ActivityRecord>>,
    granularity: Granularity,
    options: &AggregateOptions,
) -> BTreeMap<i64, Result<Vec<Bucket>, AggregateError>> {
    records_by_user
        .par_iter()
        .map(|(user_id, records)| (*user_id, aggregate_with(records, granularity, options)))
        .collect()
}

/// Parse a record date. Accepts `YYYY-MM-DD`, RFC 3339 timestamps and
/// `YYYY-MM-DD HH:MM:SS`; timestamps keep the calendar date as written.
pub fn parse_activity_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("missing date".to_string());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .map(|timestamp| timestamp.date())
        .map_err(|e| e.to_string())
}

/// First day of the week containing `date`, or `None` when that day falls
/// before the earliest representable date.
pub fn week_anchor(date: NaiveDate, week_start: Weekday) -> Option<NaiveDate> {
    let offset = (date.weekday().num_days_from_sunday() + 7
        - week_start.num_days_from_sunday())
        % 7;
    date.checked_sub_days(Days::new(u64::from(offset)))
}

// =============================================================================
// Internal helpers
// =============================================================================

type DatedRecord<'a> = (NaiveDate, usize, &'a ActivityRecord);

fn daily_buckets(dated: &[DatedRecord<'_>], window: usize) -> Vec<Bucket> {
    let start = dated.len().saturating_sub(window);

    dated[start..]
        .iter()
        .map(|(date, _, record)| {
            let key = BucketKey::Day(*date);
            Bucket {
                label: key.label(),
                bucket_key: key,
                steps_avg: record.steps,
                calories_avg: record.calories_burned,
                standing_hours_avg: record.standing_hours,
                distance_km_avg: round_to_hundredths(record.distance_meters / 1000.0),
                record_count: 1,
            }
        })
        .collect()
}

fn grouped_buckets<F>(dated: &[DatedRecord<'_>], key_of: F) -> Result<Vec<Bucket>, AggregateError>
where
    F: Fn(NaiveDate) -> Option<BucketKey>,
{
    let mut groups: BTreeMap<BucketKey, BucketAccumulator> = BTreeMap::new();

    for (date, index, record) in dated {
        let key = key_of(*date).ok_or_else(|| AggregateError::Validation {
            index: *index,
            date: record.date.clone(),
            reason: "date out of range".to_string(),
        })?;
        groups.entry(key).or_default().add_record(record);
    }

    Ok(groups
        .into_iter()
        .map(|(key, acc)| acc.into_bucket(key))
        .collect())
}

#[derive(Default)]
struct BucketAccumulator {
    steps: i64,
    calories: f64,
    standing_hours: f64,
    distance_km: f64,
    records: u32,
}

impl BucketAccumulator {
    fn add_record(&mut self, record: &ActivityRecord) {
        self.steps = self.steps.saturating_add(record.steps);
        self.calories += record.calories_burned;
        self.standing_hours += record.standing_hours;
        self.distance_km += record.distance_meters / 1000.0;
        self.records = self.records.saturating_add(1);
    }

    fn into_bucket(self, key: BucketKey) -> Bucket {
        let count = f64::from(self.records.max(1));

        Bucket {
            label: key.label(),
            bucket_key: key,
            steps_avg: (self.steps as f64 / count).round() as i64,
            calories_avg: (self.calories / count).round(),
            standing_hours_avg: (self.standing_hours / count).round(),
            distance_km_avg: round_to_hundredths(self.distance_km / count),
            record_count: self.records,
        }
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn mock_record(date: &str, steps: i64) -> ActivityRecord {
        ActivityRecord {
            id: None,
            user_id: Some(1),
            date: date.to_string(),
            steps,
            calories_burned: steps as f64 / 20.0,
            standing_hours: 8.0,
            distance_meters: steps as f64 * 0.75,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_aggregate_empty() {
        for granularity in [Granularity::Daily, Granularity::Weekly, Granularity::Monthly] {
            assert_eq!(aggregate(&[], granularity), Ok(Vec::new()));
        }
    }

    #[test]
    fn test_daily_passes_raw_values_through() {
        let mut record = mock_record("2024-02-10", 8421);
        record.calories_burned = 412.5;
        record.standing_hours = 9.5;
        record.distance_meters = 6318.0;

        let result = aggregate(&[record], Granularity::Daily).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].label, "10/02");
        assert_eq!(result[0].bucket_key, BucketKey::Day(date("2024-02-10")));
        assert_eq!(result[0].steps_avg, 8421);
        assert_eq!(result[0].calories_avg, 412.5);
        assert_eq!(result[0].standing_hours_avg, 9.5);
        assert_eq!(result[0].distance_km_avg, 6.32);
        assert_eq!(result[0].record_count, 1);
    }

    #[test]
    fn test_daily_keeps_most_recent_thirty() {
        let start = date("2024-01-01");
        // Reverse order, the way the store returns records
        let records: Vec<ActivityRecord> = (0..45)
            .rev()
            .map(|i| {
                let day = start + Duration::days(i);
                mock_record(&day.format("%Y-%m-%d").to_string(), 1000 + i)
            })
            .collect();

        let result = aggregate(&records, Granularity::Daily).unwrap();
        assert_eq!(result.len(), 30);
        assert_eq!(result[0].bucket_key, BucketKey::Day(date("2024-01-16")));
        assert_eq!(result[29].bucket_key, BucketKey::Day(date("2024-02-14")));
        assert_eq!(result[29].steps_avg, 1044);
    }

    #[test]
    fn test_daily_fewer_than_window() {
        let records = vec![mock_record("2024-01-02", 1), mock_record("2024-01-01", 2)];
        let result = aggregate(&records, Granularity::Daily).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].steps_avg, 2);
        assert_eq!(result[1].steps_avg, 1);
    }

    #[test]
    fn test_daily_duplicate_dates_keep_input_order() {
        let records = vec![
            mock_record("2024-01-02", 10),
            mock_record("2024-01-01", 20),
            mock_record("2024-01-02", 30),
        ];
        let result = aggregate(&records, Granularity::Daily).unwrap();
        let steps: Vec<i64> = result.iter().map(|b| b.steps_avg).collect();
        assert_eq!(steps, vec![20, 10, 30]);
    }

    #[test]
    fn test_daily_custom_window() {
        let records = vec![
            mock_record("2024-01-01", 1),
            mock_record("2024-01-02", 2),
            mock_record("2024-01-03", 3),
        ];
        let options = AggregateOptions {
            daily_window: 2,
            ..AggregateOptions::default()
        };
        let result = aggregate_with(&records, Granularity::Daily, &options).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].steps_avg, 2);
    }

    #[test]
    fn test_weekly_one_record_per_week() {
        // 2024-01-01 and 2024-01-08 are both Mondays
        let records = vec![mock_record("2024-01-01", 1000), mock_record("2024-01-08", 2000)];
        let result = aggregate(&records, Granularity::Weekly).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].record_count, 1);
        assert_eq!(result[0].steps_avg, 1000);
        assert_eq!(result[1].record_count, 1);
        assert_eq!(result[1].steps_avg, 2000);
    }

    #[test]
    fn test_weekly_anchor_is_sunday_by_default() {
        let records = vec![mock_record("2024-01-03", 100)];
        let result = aggregate(&records, Granularity::Weekly).unwrap();
        assert_eq!(result[0].bucket_key, BucketKey::Week(date("2023-12-31")));
        assert_eq!(result[0].label, "Week 31/12");
    }

    #[test]
    fn test_weekly_sunday_opens_new_week() {
        // Sat 2024-01-06 and Sun 2024-01-07
        let records = vec![mock_record("2024-01-06", 100), mock_record("2024-01-07", 300)];
        let result = aggregate(&records, Granularity::Weekly).unwrap();
        assert_eq!(result.len(), 2);

        let monday = AggregateOptions {
            week_start: Weekday::Mon,
            ..AggregateOptions::default()
        };
        let result = aggregate_with(&records, Granularity::Weekly, &monday).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].bucket_key, BucketKey::Week(date("2024-01-01")));
        assert_eq!(result[0].steps_avg, 200);
    }

    #[test]
    fn test_weekly_averages_are_rounded() {
        let mut a = mock_record("2024-01-01", 1000);
        let mut b = mock_record("2024-01-02", 1001);
        a.calories_burned = 100.0;
        b.calories_burned = 101.0;
        a.standing_hours = 7.0;
        b.standing_hours = 8.0;
        a.distance_meters = 1234.0;
        b.distance_meters = 2345.0;

        let result = aggregate(&[a, b], Granularity::Weekly).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].record_count, 2);
        assert_eq!(result[0].steps_avg, 1001); // 1000.5 rounds up
        assert_eq!(result[0].calories_avg, 101.0);
        assert_eq!(result[0].standing_hours_avg, 8.0);
        assert_eq!(result[0].distance_km_avg, 1.79);
    }

    #[test]
    fn test_monthly_single_bucket() {
        let records = vec![
            mock_record("2024-01-05", 1000),
            mock_record("2024-01-15", 2000),
            mock_record("2024-01-25", 3000),
        ];
        let result = aggregate(&records, Granularity::Monthly).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].record_count, 3);
        assert_eq!(result[0].steps_avg, 2000);
        assert_eq!(result[0].label, "January 2024");
        assert_eq!(
            result[0].bucket_key,
            BucketKey::Month {
                year: 2024,
                month: 1
            }
        );
    }

    #[test]
    fn test_monthly_year_boundary_is_chronological() {
        let records = vec![
            mock_record("2024-01-02", 10),
            mock_record("2023-12-30", 20),
            mock_record("2023-11-01", 30),
        ];
        let result = aggregate(&records, Granularity::Monthly).unwrap();
        let labels: Vec<&str> = result.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["November 2023", "December 2023", "January 2024"]);
    }

    #[test]
    fn test_malformed_date_fails_whole_call() {
        let records = vec![
            mock_record("2024-01-01", 10),
            mock_record("not-a-date", 20),
            mock_record("2024-01-03", 30),
        ];

        for granularity in [Granularity::Daily, Granularity::Weekly, Granularity::Monthly] {
            match aggregate(&records, granularity) {
                Err(AggregateError::Validation { index, date, .. }) => {
                    assert_eq!(index, 1);
                    assert_eq!(date, "not-a-date");
                }
                other => panic!("expected validation error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_missing_date_is_validation_error() {
        let records = vec![mock_record("", 10)];
        let err = aggregate(&records, Granularity::Weekly).unwrap_err();
        assert_eq!(
            err.to_string(),
            "record 0 has invalid date '': missing date"
        );
    }

    #[test]
    fn test_impossible_calendar_date_is_rejected() {
        let records = vec![mock_record("2023-02-29", 10)];
        assert!(aggregate(&records, Granularity::Monthly).is_err());
    }

    #[test]
    fn test_parse_activity_date_formats() {
        assert_eq!(parse_activity_date("2024-05-06"), Ok(date("2024-05-06")));
        assert_eq!(
            parse_activity_date("2024-05-06T23:30:00-05:00"),
            Ok(date("2024-05-06"))
        );
        assert_eq!(
            parse_activity_date("2024-05-06 07:15:00"),
            Ok(date("2024-05-06"))
        );
        assert!(parse_activity_date("06/05/2024").is_err());
    }

    #[test]
    fn test_week_anchor_each_start_day() {
        let wednesday = date("2024-01-03");
        assert_eq!(week_anchor(wednesday, Weekday::Sun), Some(date("2023-12-31")));
        assert_eq!(week_anchor(wednesday, Weekday::Mon), Some(date("2024-01-01")));
        assert_eq!(week_anchor(wednesday, Weekday::Wed), Some(wednesday));
        assert_eq!(week_anchor(wednesday, Weekday::Thu), Some(date("2023-12-28")));
    }

    #[test]
    fn test_week_anchor_before_earliest_date() {
        // The Sunday before the earliest date lies outside the calendar
        assert_ne!(NaiveDate::MIN.weekday(), Weekday::Sun);
        assert_eq!(week_anchor(NaiveDate::MIN, Weekday::Sun), None);
        assert_eq!(
            week_anchor(NaiveDate::MIN, NaiveDate::MIN.weekday()),
            Some(NaiveDate::MIN)
        );
    }

    #[test]
    fn test_weekly_out_of_range_date_is_validation_error() {
        let earliest = NaiveDate::MIN.format("%Y-%m-%d").to_string();
        let records = vec![mock_record("2024-01-01", 10), mock_record(&earliest, 20)];

        match aggregate(&records, Granularity::Weekly) {
            Err(AggregateError::Validation { index, date, reason }) => {
                assert_eq!(index, 1);
                assert_eq!(date, earliest);
                assert_eq!(reason, "date out of range");
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        // Monthly buckets need no date arithmetic
        assert_eq!(aggregate(&records, Granularity::Monthly).unwrap().len(), 2);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let records = vec![
            mock_record("2024-03-01", 4000),
            mock_record("2024-02-11", 5000),
            mock_record("2024-02-12", 6000),
        ];
        for granularity in [Granularity::Daily, Granularity::Weekly, Granularity::Monthly] {
            let first = aggregate(&records, granularity).unwrap();
            let second = aggregate(&records, granularity).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_grouped_buckets_preserve_counts_and_sums() {
        let start = date("2024-01-01");
        let records: Vec<ActivityRecord> = (0..100)
            .map(|i| {
                let day = start + Duration::days((i * 37) % 120);
                mock_record(&day.format("%Y-%m-%d").to_string(), 3000 + (i * 131) % 7000)
            })
            .collect();

        for granularity in [Granularity::Weekly, Granularity::Monthly] {
            let buckets = aggregate(&records, granularity).unwrap();

            let total: u32 = buckets.iter().map(|b| b.record_count).sum();
            assert_eq!(total as usize, records.len());

            assert!(buckets
                .windows(2)
                .all(|pair| pair[0].bucket_key <= pair[1].bucket_key));

            for bucket in &buckets {
                let raw_sum: i64 = records
                    .iter()
                    .filter(|r| {
                        let d = date(&r.date);
                        match bucket.bucket_key {
                            BucketKey::Week(anchor) => week_anchor(d, Weekday::Sun) == Some(anchor),
                            BucketKey::Month { year, month } => {
                                d.year() == year && d.month() == month
                            }
                            BucketKey::Day(_) => unreachable!(),
                        }
                    })
                    .map(|r| r.steps)
                    .sum();
                let count = bucket.record_count as f64;
                let reconstructed = bucket.steps_avg as f64 * count;
                assert!((reconstructed - raw_sum as f64).abs() <= count / 2.0);
            }
        }
    }

    #[test]
    fn test_aggregate_by_user_isolates_failures() {
        let mut by_user = BTreeMap::new();
        by_user.insert(
            1,
            vec![mock_record("2024-01-01", 1000), mock_record("2024-01-02", 3000)],
        );
        by_user.insert(2, vec![mock_record("garbage", 10)]);
        by_user.insert(3, Vec::new());

        let result = aggregate_by_user(&by_user, Granularity::Monthly, &AggregateOptions::default());
        assert_eq!(result.len(), 3);
        assert_eq!(result[&1].as_ref().unwrap()[0].steps_avg, 2000);
        assert!(result[&2].is_err());
        assert!(result[&3].as_ref().unwrap().is_empty());
    }
}
