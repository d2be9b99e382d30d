use super::{format_number, format_value, open_store};
use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use fitstat_core::{Exercise, Level, MuscleGroup};
use std::path::Path;

pub fn run_users(db: &Path, json: bool) -> Result<()> {
    let store = open_store(db)?;
    let users = store.list_users()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }

    if users.is_empty() {
        println!("\n  {}\n", "No users found".bright_black());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "Username", "Email", "Level", "Step goal", "Calorie goal", "Standing goal",
    ]);
    for user in &users {
        table.add_row(vec![
            user.id.to_string(),
            user.username.clone(),
            user.email.clone(),
            user.level.to_string(),
            format_number(user.daily_step_goal),
            format_value(user.daily_calorie_goal),
            format!("{}h", format_value(user.daily_standing_goal)),
        ]);
    }
    println!("{table}");

    Ok(())
}

pub fn run_plans(
    db: &Path,
    level: Option<Level>,
    muscle_group: Option<MuscleGroup>,
    json: bool,
) -> Result<()> {
    let store = open_store(db)?;
    let plans = store.workout_plans(level, muscle_group)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    if plans.is_empty() {
        println!("\n  {}\n", "No workout plans match".bright_black());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "Name", "Level", "Muscle group", "Minutes", "Calories", "Description",
    ]);
    for plan in &plans {
        table.add_row(vec![
            plan.id.to_string(),
            plan.name.clone(),
            plan.level.to_string(),
            plan.muscle_group.to_string(),
            plan.duration_minutes.to_string(),
            format_number(plan.calories_estimate),
            plan.description.clone().unwrap_or_default(),
        ]);
    }
    println!("{table}");

    Ok(())
}

pub fn run_exercises(db: &Path, plan_id: i64, json: bool) -> Result<()> {
    let store = open_store(db)?;
    let exercises = store.plan_exercises(plan_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&exercises)?);
        return Ok(());
    }

    if exercises.is_empty() {
        println!(
            "\n  {}\n",
            format!("No exercises for plan {}", plan_id).bright_black()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Exercise", "Muscle group", "Difficulty", "Work", "Rest"]);
    for exercise in &exercises {
        table.add_row(vec![
            exercise
                .exercise_order
                .map(|o| o.to_string())
                .unwrap_or_default(),
            exercise.name.clone(),
            exercise.muscle_group.to_string(),
            exercise.difficulty.to_string(),
            describe_work(exercise),
            exercise
                .rest_seconds
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{table}");

    Ok(())
}

fn describe_work(exercise: &Exercise) -> String {
    match (exercise.sets, exercise.reps, exercise.duration_seconds) {
        (Some(sets), Some(reps), _) => format!("{} x {}", sets, reps),
        (Some(sets), None, Some(secs)) => format!("{} x {}s", sets, secs),
        (None, _, Some(secs)) => format!("{}s", secs),
        (Some(sets), None, None) => format!("{} sets", sets),
        (None, Some(reps), None) => format!("{} reps", reps),
        (None, None, None) => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(sets: Option<i64>, reps: Option<i64>, duration: Option<i64>) -> Exercise {
        Exercise {
            id: 1,
            name: "Squat".to_string(),
            description: None,
            muscle_group: MuscleGroup::Legs,
            difficulty: Level::Beginner,
            sets,
            reps,
            duration_seconds: duration,
            rest_seconds: None,
            created_at: String::new(),
            exercise_order: Some(1),
        }
    }

    #[test]
    fn test_describe_work() {
        assert_eq!(describe_work(&exercise(Some(3), Some(15), None)), "3 x 15");
        assert_eq!(describe_work(&exercise(Some(2), None, Some(30))), "2 x 30s");
        assert_eq!(describe_work(&exercise(None, None, Some(60))), "60s");
        assert_eq!(describe_work(&exercise(None, None, None)), "-");
    }
}
