//! Daily goal completion for a user's latest activity record

use crate::aggregator::{parse_activity_date, AggregateError};
use crate::{ActivityRecord, User};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    /// Date of the record the percentages were computed from.
    pub date: Option<String>,
    pub steps_percent: f64,
    pub calories_percent: f64,
    pub standing_percent: f64,
}

impl GoalProgress {
    pub fn for_user(user: &User, latest: Option<&ActivityRecord>) -> Self {
        match latest {
            Some(record) => Self {
                date: Some(record.date.clone()),
                steps_percent: completion_percent(record.steps as f64, user.daily_step_goal as f64),
                calories_percent: completion_percent(
                    record.calories_burned,
                    user.daily_calorie_goal,
                ),
                standing_percent: completion_percent(
                    record.standing_hours,
                    user.daily_standing_goal,
                ),
            },
            None => Self {
                date: None,
                steps_percent: 0.0,
                calories_percent: 0.0,
                standing_percent: 0.0,
            },
        }
    }
}

/// `current / goal` as a percentage, capped at 100. A non-positive goal
/// counts as 0% rather than producing an infinite ratio.
pub fn completion_percent(current: f64, goal: f64) -> f64 {
    if goal <= 0.0 || !goal.is_finite() {
        return 0.0;
    }
    (current / goal * 100.0).min(100.0)
}

/// The record with the greatest date; the first one wins on ties.
pub fn latest_record(records: &[ActivityRecord]) -> Result<Option<&ActivityRecord>, AggregateError> {
    let mut latest: Option<(chrono::NaiveDate, &ActivityRecord)> = None;

    for (index, record) in records.iter().enumerate() {
        let date = parse_activity_date(&record.date).map_err(|reason| {
            AggregateError::Validation {
                index,
                date: record.date.clone(),
                reason,
            }
        })?;
        let newer = match latest {
            Some((best, _)) => date > best,
            None => true,
        };
        if newer {
            latest = Some((date, record));
        }
    }

    Ok(latest.map(|(_, record)| record))
}
