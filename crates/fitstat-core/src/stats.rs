//! Descriptive statistics over one bucketed series

use crate::{Bucket, ParseEnumError, SummaryStatistics};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Which bucket field a series is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    Steps,
    Calories,
    StandingHours,
    Distance,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Steps => "steps",
            Metric::Calories => "calories",
            Metric::StandingHours => "standing-hours",
            Metric::Distance => "distance",
        }
    }

    pub fn value(&self, bucket: &Bucket) -> f64 {
        match self {
            Metric::Steps => bucket.steps_avg as f64,
            Metric::Calories => bucket.calories_avg,
            Metric::StandingHours => bucket.standing_hours_avg,
            Metric::Distance => bucket.distance_km_avg,
        }
    }

    pub fn series(&self, buckets: &[Bucket]) -> Vec<f64> {
        buckets.iter().map(|b| self.value(b)).collect()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "steps" => Ok(Metric::Steps),
            "calories" => Ok(Metric::Calories),
            "standing-hours" | "standing_hours" | "standing" => Ok(Metric::StandingHours),
            "distance" => Ok(Metric::Distance),
            _ => Err(ParseEnumError::new("metric", s)),
        }
    }
}

/// Current, rounded average, maximum and minimum of a series.
///
/// Returns `None` for an empty series, which callers render as "no data".
pub fn summarize(series: &[f64]) -> Option<SummaryStatistics> {
    let (&current, _) = series.split_last()?;

    let mut sum = 0.0;
    let mut maximum = f64::NEG_INFINITY;
    let mut minimum = f64::INFINITY;
    for &value in series {
        sum += value;
        maximum = maximum.max(value);
        minimum = minimum.min(value);
    }

    Some(SummaryStatistics {
        current,
        average: (sum / series.len() as f64).round(),
        maximum,
        minimum,
    })
}

pub fn summarize_metric(buckets: &[Bucket], metric: Metric) -> Option<SummaryStatistics> {
    summarize(&metric.series(buckets))
}
