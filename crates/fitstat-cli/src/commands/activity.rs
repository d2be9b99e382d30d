use super::{format_number, format_percent, format_value, open_store};
use anyhow::{anyhow, Result};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use fitstat_core::store::{NewActivity, DEMO_USERNAME};
use fitstat_core::{latest_record, ActivityRecord, GoalProgress};
use serde::Serialize;
use std::path::Path;

pub fn run_init_db(db: &Path, seed: bool, json: bool) -> Result<()> {
    let store = open_store(db)?;
    let mut already_seeded = false;
    let demo_user = if !seed {
        None
    } else if let Some(existing) = store.user_id_by_username(DEMO_USERNAME)? {
        already_seeded = true;
        Some(existing)
    } else {
        Some(store.seed_demo()?)
    };

    if json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct InitJson {
            database: String,
            demo_user_id: Option<i64>,
            already_seeded: bool,
        }

        let output = InitJson {
            database: db.display().to_string(),
            demo_user_id: demo_user,
            already_seeded,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("  Database ready at {}", db.display().to_string().cyan());
        match demo_user {
            Some(user_id) if already_seeded => println!(
                "  {}",
                format!("Demo data already present (user id {})", user_id).bright_black()
            ),
            Some(user_id) => println!(
                "  {}",
                format!("Seeded demo data (user id {})", user_id).bright_black()
            ),
            None => {}
        }
    }

    Ok(())
}

pub fn run_add_activity(db: &Path, activity: NewActivity, json: bool) -> Result<()> {
    let store = open_store(db)?;
    if store.get_user(activity.user_id)?.is_none() {
        return Err(anyhow!("User {} not found", activity.user_id));
    }
    let id = store.insert_activity(&activity)?;

    if json {
        #[derive(Serialize)]
        struct AddJson {
            message: &'static str,
            id: i64,
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&AddJson {
                message: "success",
                id
            })?
        );
    } else {
        println!(
            "  Recorded {} steps for user {} on {} (id {})",
            format_number(activity.steps),
            activity.user_id,
            activity.date,
            id
        );
    }

    Ok(())
}

/// A user's most recent records, newest first.
pub fn run_activities(db: &Path, user_id: i64, limit: usize, json: bool) -> Result<()> {
    let store = open_store(db)?;
    let user = store
        .get_user(user_id)?
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;
    let activities = store.activities_for_user(user_id)?;
    let recent = &activities[..activities.len().min(limit)];

    if json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ActivityJson<'a> {
            id: Option<i64>,
            date: &'a str,
            steps: i64,
            calories_burned: f64,
            standing_hours: f64,
            distance_km: Option<f64>,
        }

        let output: Vec<ActivityJson> = recent
            .iter()
            .map(|a| ActivityJson {
                id: a.id,
                date: &a.date,
                steps: a.steps,
                calories_burned: a.calories_burned,
                standing_hours: a.standing_hours,
                distance_km: distance_km(a),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("\n  {}\n", format!("Activity history for {}", user.username).cyan());
    if recent.is_empty() {
        println!("  {}\n", "No activity recorded yet".bright_black());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Date", "Steps", "Calories", "Standing", "Distance"]);
    for activity in recent {
        table.add_row(vec![
            activity.date.clone(),
            format_number(activity.steps),
            format!("{} kcal", format_value(activity.calories_burned)),
            format!("{}h", format_value(activity.standing_hours)),
            distance_km(activity)
                .map(|km| format!("{:.2} km", km))
                .unwrap_or_else(|| "No distance".to_string()),
        ]);
    }
    println!("{table}");

    if activities.len() > recent.len() {
        println!(
            "  {}",
            format!("{} of {} records", recent.len(), activities.len()).bright_black()
        );
    }

    Ok(())
}

fn distance_km(activity: &ActivityRecord) -> Option<f64> {
    (activity.distance_meters > 0.0).then(|| (activity.distance_meters / 10.0).round() / 100.0)
}

pub fn run_progress(db: &Path, user_id: i64, json: bool) -> Result<()> {
    let store = open_store(db)?;
    let user = store
        .get_user(user_id)?
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;
    let activities = store.activities_for_user(user_id)?;
    let latest = latest_record(&activities)?;
    let progress = GoalProgress::for_user(&user, latest);

    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(());
    }

    println!("\n  {}", format!("Daily goals for {}", user.username).cyan());
    let Some(record) = latest else {
        println!("  {}", "No activity recorded yet".bright_black());
        println!();
        return Ok(());
    };
    println!("  {}", format!("Latest record: {}", record.date).bright_black());
    println!();

    let rows = [
        (
            "Steps",
            format_number(record.steps),
            format_number(user.daily_step_goal),
            progress.steps_percent,
        ),
        (
            "Calories",
            format_value(record.calories_burned),
            format_value(user.daily_calorie_goal),
            progress.calories_percent,
        ),
        (
            "Standing",
            format!("{}h", format_value(record.standing_hours)),
            format!("{}h", format_value(user.daily_standing_goal)),
            progress.standing_percent,
        ),
    ];

    for (label, current, goal, percent) in rows {
        let bar = progress_bar(percent, 20);
        let percent_text = if percent >= 100.0 {
            "Goal reached".green().to_string()
        } else {
            format_percent(percent)
        };
        println!(
            "  {:<9} {} {:>12} / {:<10} {}",
            label, bar, current, goal, percent_text
        );
    }
    println!();

    Ok(())
}

fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!(
        "[{}{}]",
        "#".repeat(filled).green(),
        "-".repeat(width - filled).bright_black()
    )
}
