mod commands;
mod config;

use anyhow::Result;
use chrono::Weekday;
use clap::{Parser, Subcommand};
use commands::analytics::RecordSource;
use config::FitstatConfig;
use fitstat_core::store::NewActivity;
use fitstat_core::{Granularity, Level, Metric, MuscleGroup};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fitstat")]
#[command(author, version, about = "Fitness activity analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Path to the SQLite database")]
    db: Option<PathBuf>,

    #[arg(long, global = true, help = "Output as JSON")]
    json: bool,

    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    InitDb {
        #[arg(long, help = "Insert a demo user, activity history and workout plans")]
        seed: bool,
    },
    /// List users and their daily goals
    Users,
    /// Bucket activity history by day, week or month
    Analytics {
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        user: Option<i64>,

        #[arg(long, help = "Read records from a .json or .csv file instead of the database")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "daily, weekly or monthly")]
        granularity: Option<Granularity>,

        #[arg(short, long, default_value = "steps", help = "Metric to summarize")]
        metric: Metric,

        #[arg(long, value_parser = parse_weekday, help = "First day of each week")]
        week_start: Option<Weekday>,
    },
    /// Goal completion for a user's latest activity record
    Progress {
        #[arg(long)]
        user: i64,
    },
    /// List a user's most recent activity records
    Activities {
        #[arg(long)]
        user: i64,

        #[arg(short, long, default_value = "5", help = "Number of records to show")]
        limit: usize,
    },
    /// Record one day of activity
    AddActivity {
        #[arg(long)]
        user: i64,

        #[arg(long, help = "Date (YYYY-MM-DD)")]
        date: String,

        #[arg(long)]
        steps: i64,

        #[arg(long, default_value = "0")]
        calories: f64,

        #[arg(long, default_value = "0")]
        standing: f64,

        #[arg(long, default_value = "0", help = "Distance in meters")]
        distance: f64,
    },
    /// List workout plans
    Plans {
        #[arg(long)]
        level: Option<Level>,

        #[arg(long)]
        muscle_group: Option<MuscleGroup>,
    },
    /// Show the exercises of a workout plan in order
    Exercises {
        plan_id: i64,
    },
    /// Summaries for every user in the database
    Overview {
        #[arg(short, long, help = "daily, weekly or monthly")]
        granularity: Option<Granularity>,

        #[arg(short, long, default_value = "steps")]
        metric: Metric,

        #[arg(long, value_parser = parse_weekday)]
        week_start: Option<Weekday>,
    },
}

fn parse_weekday(raw: &str) -> Result<Weekday, String> {
    raw.parse::<Weekday>()
        .map_err(|_| format!("unknown weekday '{}'", raw))
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = FitstatConfig::load();
    let db = config.database_path(cli.db);
    debug!(db = %db.display(), "using database");

    match cli.command {
        Commands::InitDb { seed } => commands::activity::run_init_db(&db, seed, cli.json),
        Commands::Users => commands::catalog::run_users(&db, cli.json),
        Commands::Analytics {
            user,
            input,
            granularity,
            metric,
            week_start,
        } => {
            let source = match (user, input) {
                (_, Some(path)) => RecordSource::File(path),
                (Some(user_id), None) => RecordSource::User(user_id),
                (None, None) => anyhow::bail!("Either --user or --input is required"),
            };
            commands::analytics::run_analytics(
                &db,
                source,
                config.granularity(granularity),
                metric,
                config.aggregate_options(week_start),
                cli.json,
            )
        }
        Commands::Progress { user } => commands::activity::run_progress(&db, user, cli.json),
        Commands::Activities { user, limit } => {
            commands::activity::run_activities(&db, user, limit, cli.json)
        }
        Commands::AddActivity {
            user,
            date,
            steps,
            calories,
            standing,
            distance,
        } => commands::activity::run_add_activity(
            &db,
            NewActivity {
                user_id: user,
                date,
                steps,
                calories_burned: calories,
                standing_hours: standing,
                distance_meters: distance,
            },
            cli.json,
        ),
        Commands::Plans {
            level,
            muscle_group,
        } => commands::catalog::run_plans(&db, level, muscle_group, cli.json),
        Commands::Exercises { plan_id } => {
            commands::catalog::run_exercises(&db, plan_id, cli.json)
        }
        Commands::Overview {
            granularity,
            metric,
            week_start,
        } => commands::analytics::run_overview(
            &db,
            config.granularity(granularity),
            metric,
            config.aggregate_options(week_start),
            cli.json,
        ),
    }
}
