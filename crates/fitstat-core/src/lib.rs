#![deny(clippy::all)]

mod aggregator;
pub mod import;
mod progress;
mod stats;
pub mod store;

pub use aggregator::*;
pub use progress::*;
pub use stats::*;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One day of raw fitness metrics for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub date: String,
    pub steps: i64,
    pub calories_burned: f64,
    pub standing_hours: f64,
    pub distance_meters: f64,
}

impl ActivityRecord {
    pub fn check_metrics(&self) -> Result<(), InvalidMetric> {
        check_metrics(
            self.steps,
            self.calories_burned,
            self.standing_hours,
            self.distance_meters,
        )
    }
}

/// A metric that is negative, NaN or infinite.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field} must be a non-negative number, got {value}")]
pub struct InvalidMetric {
    pub field: &'static str,
    pub value: f64,
}

pub(crate) fn check_metrics(
    steps: i64,
    calories_burned: f64,
    standing_hours: f64,
    distance_meters: f64,
) -> Result<(), InvalidMetric> {
    if steps < 0 {
        return Err(InvalidMetric {
            field: "steps",
            value: steps as f64,
        });
    }
    for (field, value) in [
        ("calories_burned", calories_burned),
        ("standing_hours", standing_hours),
        ("distance_meters", distance_meters),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(InvalidMetric { field, value });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Granularity::Daily),
            "weekly" | "week" => Ok(Granularity::Weekly),
            "monthly" | "month" => Ok(Granularity::Monthly),
            _ => Err(ParseEnumError::new("granularity", s)),
        }
    }
}

/// Canonical, ordered identity of a bucket.
///
/// Keys of one aggregation call always share a variant, so the derived
/// ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Day(NaiveDate),
    /// First day of the week containing the folded records.
    Week(NaiveDate),
    Month { year: i32, month: u32 },
}

impl BucketKey {
    pub fn label(&self) -> String {
        match self {
            BucketKey::Day(date) => date.format("%d/%m").to_string(),
            BucketKey::Week(anchor) => format!("Week {}/{}", anchor.day(), anchor.month()),
            BucketKey::Month { year, month } => NaiveDate::from_ymd_opt(*year, *month, 1)
                .map(|first| first.format("%B %Y").to_string())
                .unwrap_or_else(|| self.to_string()),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Day(date) | BucketKey::Week(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            BucketKey::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub label: String,
    pub bucket_key: BucketKey,
    pub steps_avg: i64,
    pub calories_avg: f64,
    pub standing_hours_avg: f64,
    pub distance_km_avg: f64,
    pub record_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub current: f64,
    pub average: f64,
    pub maximum: f64,
    pub minimum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl FromStr for Level {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Level::Beginner),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            _ => Err(ParseEnumError::new("level", s)),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuscleGroup {
    Arms,
    Legs,
    Abs,
    Chest,
    Back,
    Cardio,
}

impl MuscleGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuscleGroup::Arms => "arms",
            MuscleGroup::Legs => "legs",
            MuscleGroup::Abs => "abs",
            MuscleGroup::Chest => "chest",
            MuscleGroup::Back => "back",
            MuscleGroup::Cardio => "cardio",
        }
    }
}

impl FromStr for MuscleGroup {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arms" => Ok(MuscleGroup::Arms),
            "legs" => Ok(MuscleGroup::Legs),
            "abs" => Ok(MuscleGroup::Abs),
            "chest" => Ok(MuscleGroup::Chest),
            "back" => Ok(MuscleGroup::Back),
            "cardio" => Ok(MuscleGroup::Cardio),
            _ => Err(ParseEnumError::new("muscle group", s)),
        }
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A user as exposed to callers. The stored password column is never loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub level: Level,
    pub daily_step_goal: i64,
    pub daily_calorie_goal: f64,
    pub daily_standing_goal: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    pub id: i64,
    pub name: String,
    pub level: Level,
    pub muscle_group: MuscleGroup,
    pub duration_minutes: i64,
    pub calories_estimate: i64,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub muscle_group: MuscleGroup,
    pub difficulty: Level,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub rest_seconds: Option<i64>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise_order: Option<i64>,
}
