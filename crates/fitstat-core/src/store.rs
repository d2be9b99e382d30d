//! SQLite storage for users, daily activity logs and workout plans.
//!
//! Every operation is a single parameterized query; the only join is
//! between exercises and the plan/exercise link table.

use crate::aggregator::parse_activity_date;
use crate::{check_metrics, ActivityRecord, Exercise, Level, MuscleGroup, User, WorkoutPlan};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid activity: {0}")]
    InvalidActivity(String),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  username TEXT NOT NULL UNIQUE,
  email TEXT NOT NULL UNIQUE,
  password_hash TEXT NOT NULL DEFAULT '',
  level TEXT NOT NULL DEFAULT 'beginner',
  daily_step_goal INTEGER NOT NULL DEFAULT 10000,
  daily_calorie_goal REAL NOT NULL DEFAULT 500,
  daily_standing_goal REAL NOT NULL DEFAULT 12,
  created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
  updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS daily_activities (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL REFERENCES users(id),
  date TEXT NOT NULL,
  steps INTEGER NOT NULL DEFAULT 0,
  calories_burned REAL NOT NULL DEFAULT 0,
  standing_hours REAL NOT NULL DEFAULT 0,
  distance_meters REAL NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_daily_activities_user_date ON daily_activities(user_id, date DESC);

CREATE TABLE IF NOT EXISTS workout_plans (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  level TEXT NOT NULL,
  muscle_group TEXT NOT NULL,
  duration_minutes INTEGER NOT NULL,
  calories_estimate INTEGER NOT NULL,
  description TEXT,
  created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS exercises (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  description TEXT,
  muscle_group TEXT NOT NULL,
  difficulty TEXT NOT NULL,
  sets INTEGER,
  reps INTEGER,
  duration_seconds INTEGER,
  rest_seconds INTEGER,
  created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS workout_plan_exercises (
  workout_plan_id INTEGER NOT NULL REFERENCES workout_plans(id),
  exercise_id INTEGER NOT NULL REFERENCES exercises(id),
  exercise_order INTEGER NOT NULL,
  sets INTEGER,
  reps INTEGER,
  duration_seconds INTEGER,
  PRIMARY KEY (workout_plan_id, exercise_id)
);
"#;

/// Username of the account created by [`Store::seed_demo`].
pub const DEMO_USERNAME: &str = "demo";

const USER_COLUMNS: &str = "id, username, email, level, daily_step_goal, daily_calorie_goal, \
     daily_standing_goal, created_at, updated_at";

const ACTIVITY_COLUMNS: &str =
    "id, user_id, date, steps, calories_burned, standing_hours, distance_meters";

#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub user_id: i64,
    pub date: String,
    pub steps: i64,
    pub calories_burned: f64,
    pub standing_hours: f64,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub level: Level,
    pub daily_step_goal: i64,
    pub daily_calorie_goal: f64,
    pub daily_standing_goal: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkoutPlan {
    pub name: String,
    pub level: Level,
    pub muscle_group: MuscleGroup,
    pub duration_minutes: i64,
    pub calories_estimate: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExercise {
    pub name: String,
    pub description: Option<String>,
    pub muscle_group: MuscleGroup,
    pub difficulty: Level,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub rest_seconds: Option<i64>,
}

/// An exercise's slot in a plan. Set values override the exercise defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub exercise_id: i64,
    pub exercise_order: i64,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub duration_seconds: Option<i64>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(2))?;
        debug!(path = %path.as_ref().display(), "opened activity database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], user_from_row).optional()?)
    }

    pub fn user_id_by_username(&self, username: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// A user's activity history, newest first.
    pub fn activities_for_user(&self, user_id: i64) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM daily_activities \
             WHERE user_id = ?1 ORDER BY date DESC, id DESC"
        ))?;
        let activities = stmt
            .query_map(params![user_id], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(user_id, count = activities.len(), "loaded activities");
        Ok(activities)
    }

    /// Every activity record, grouped by user and newest first within a user.
    pub fn all_activities(&self) -> Result<BTreeMap<i64, Vec<ActivityRecord>>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM daily_activities \
             ORDER BY user_id, date DESC, id DESC"
        ))?;
        let mut by_user: BTreeMap<i64, Vec<ActivityRecord>> = BTreeMap::new();
        for row in stmt.query_map([], activity_from_row)? {
            let record = row?;
            by_user
                .entry(record.user_id.unwrap_or_default())
                .or_default()
                .push(record);
        }
        Ok(by_user)
    }

    pub fn insert_activity(&self, activity: &NewActivity) -> Result<i64, StoreError> {
        let date = parse_activity_date(&activity.date).map_err(|reason| {
            StoreError::InvalidActivity(format!("date '{}': {}", activity.date, reason))
        })?;
        check_metrics(
            activity.steps,
            activity.calories_burned,
            activity.standing_hours,
            activity.distance_meters,
        )
        .map_err(|e| StoreError::InvalidActivity(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO daily_activities \
             (user_id, date, steps, calories_burned, standing_hours, distance_meters) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                activity.user_id,
                date.format("%Y-%m-%d").to_string(),
                activity.steps,
                activity.calories_burned,
                activity.standing_hours,
                activity.distance_meters,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Workout plans, optionally filtered by level and/or muscle group.
    pub fn workout_plans(
        &self,
        level: Option<Level>,
        muscle_group: Option<MuscleGroup>,
    ) -> Result<Vec<WorkoutPlan>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, level, muscle_group, duration_minutes, calories_estimate, \
             description, created_at FROM workout_plans \
             WHERE (?1 IS NULL OR level = ?1) AND (?2 IS NULL OR muscle_group = ?2) \
             ORDER BY id",
        )?;
        let plans = stmt
            .query_map(params![level, muscle_group], |row| {
                Ok(WorkoutPlan {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    level: row.get("level")?,
                    muscle_group: row.get("muscle_group")?,
                    duration_minutes: row.get("duration_minutes")?,
                    calories_estimate: row.get("calories_estimate")?,
                    description: row.get("description")?,
                    created_at: row.get("created_at")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    /// Exercises of a plan in their configured order.
    pub fn plan_exercises(&self, plan_id: i64) -> Result<Vec<Exercise>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.name, e.description, e.muscle_group, e.difficulty, \
             COALESCE(wpe.sets, e.sets) AS sets, \
             COALESCE(wpe.reps, e.reps) AS reps, \
             COALESCE(wpe.duration_seconds, e.duration_seconds) AS duration_seconds, \
             e.rest_seconds, e.created_at, wpe.exercise_order \
             FROM exercises e \
             JOIN workout_plan_exercises wpe ON e.id = wpe.exercise_id \
             WHERE wpe.workout_plan_id = ?1 \
             ORDER BY wpe.exercise_order",
        )?;
        let exercises = stmt
            .query_map(params![plan_id], |row| {
                Ok(Exercise {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    description: row.get("description")?,
                    muscle_group: row.get("muscle_group")?,
                    difficulty: row.get("difficulty")?,
                    sets: row.get("sets")?,
                    reps: row.get("reps")?,
                    duration_seconds: row.get("duration_seconds")?,
                    rest_seconds: row.get("rest_seconds")?,
                    created_at: row.get("created_at")?,
                    exercise_order: Some(row.get("exercise_order")?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    pub fn insert_user(&self, user: &NewUser) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO users \
             (username, email, level, daily_step_goal, daily_calorie_goal, daily_standing_goal) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.username,
                user.email,
                user.level,
                user.daily_step_goal,
                user.daily_calorie_goal,
                user.daily_standing_goal,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_workout_plan(&self, plan: &NewWorkoutPlan) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO workout_plans \
             (name, level, muscle_group, duration_minutes, calories_estimate, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                plan.name,
                plan.level,
                plan.muscle_group,
                plan.duration_minutes,
                plan.calories_estimate,
                plan.description,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_exercise(&self, exercise: &NewExercise) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO exercises \
             (name, description, muscle_group, difficulty, sets, reps, duration_seconds, rest_seconds) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                exercise.name,
                exercise.description,
                exercise.muscle_group,
                exercise.difficulty,
                exercise.sets,
                exercise.reps,
                exercise.duration_seconds,
                exercise.rest_seconds,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn link_exercise(&self, plan_id: i64, entry: &PlanEntry) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO workout_plan_exercises \
             (workout_plan_id, exercise_id, exercise_order, sets, reps, duration_seconds) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                plan_id,
                entry.exercise_id,
                entry.exercise_order,
                entry.sets,
                entry.reps,
                entry.duration_seconds,
            ],
        )?;
        Ok(())
    }

    /// Insert a demo user with three weeks of activity, two workout plans
    /// and three exercises. Returns the demo user's id.
    pub fn seed_demo(&self) -> Result<i64, StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let user_id = self.insert_user(&NewUser {
            username: DEMO_USERNAME.to_string(),
            email: "demo@example.com".to_string(),
            level: Level::Intermediate,
            daily_step_goal: 10000,
            daily_calorie_goal: 500.0,
            daily_standing_goal: 12.0,
        })?;

        for day in 1..=21i64 {
            let steps = 6000 + (day * 733) % 6000;
            self.insert_activity(&NewActivity {
                user_id,
                date: format!("2024-01-{:02}", day),
                steps,
                calories_burned: (steps / 20) as f64,
                standing_hours: (6 + day % 7) as f64,
                distance_meters: steps as f64 * 0.76,
            })?;
        }

        let full_body = self.insert_workout_plan(&NewWorkoutPlan {
            name: "Full Body Starter".to_string(),
            level: Level::Beginner,
            muscle_group: MuscleGroup::Cardio,
            duration_minutes: 25,
            calories_estimate: 200,
            description: Some("Light circuit to build a routine".to_string()),
        })?;
        let leg_day = self.insert_workout_plan(&NewWorkoutPlan {
            name: "Leg Day".to_string(),
            level: Level::Intermediate,
            muscle_group: MuscleGroup::Legs,
            duration_minutes: 40,
            calories_estimate: 350,
            description: None,
        })?;

        let squat = self.insert_exercise(&NewExercise {
            name: "Squat".to_string(),
            description: Some("Bodyweight squat, full depth".to_string()),
            muscle_group: MuscleGroup::Legs,
            difficulty: Level::Beginner,
            sets: Some(3),
            reps: Some(15),
            duration_seconds: None,
            rest_seconds: Some(60),
        })?;
        let lunge = self.insert_exercise(&NewExercise {
            name: "Walking Lunge".to_string(),
            description: None,
            muscle_group: MuscleGroup::Legs,
            difficulty: Level::Intermediate,
            sets: Some(3),
            reps: Some(12),
            duration_seconds: None,
            rest_seconds: Some(60),
        })?;
        let jumping_jacks = self.insert_exercise(&NewExercise {
            name: "Jumping Jacks".to_string(),
            description: None,
            muscle_group: MuscleGroup::Cardio,
            difficulty: Level::Beginner,
            sets: None,
            reps: None,
            duration_seconds: Some(45),
            rest_seconds: Some(15),
        })?;

        self.link_exercise(
            full_body,
            &PlanEntry {
                exercise_id: jumping_jacks,
                exercise_order: 1,
                sets: None,
                reps: None,
                duration_seconds: Some(60),
            },
        )?;
        self.link_exercise(
            full_body,
            &PlanEntry {
                exercise_id: squat,
                exercise_order: 2,
                sets: Some(2),
                reps: None,
                duration_seconds: None,
            },
        )?;
        self.link_exercise(
            leg_day,
            &PlanEntry {
                exercise_id: lunge,
                exercise_order: 2,
                sets: None,
                reps: None,
                duration_seconds: None,
            },
        )?;
        self.link_exercise(
            leg_day,
            &PlanEntry {
                exercise_id: squat,
                exercise_order: 1,
                sets: Some(4),
                reps: Some(10),
                duration_seconds: None,
            },
        )?;

        tx.commit()?;
        debug!(user_id, "seeded demo data");
        Ok(user_id)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        level: row.get("level")?,
        daily_step_goal: row.get("daily_step_goal")?,
        daily_calorie_goal: row.get("daily_calorie_goal")?,
        daily_standing_goal: row.get("daily_standing_goal")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    Ok(ActivityRecord {
        id: Some(row.get("id")?),
        user_id: Some(row.get("user_id")?),
        date: row.get("date")?,
        steps: row.get("steps")?,
        calories_burned: row.get("calories_burned")?,
        standing_hours: row.get("standing_hours")?,
        distance_meters: row.get("distance_meters")?,
    })
}

impl FromSql for Level {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Level {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MuscleGroup {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for MuscleGroup {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}
