use super::{format_number, format_value, open_store};
use anyhow::{anyhow, Result};
use colored::Colorize;
use comfy_table::{Cell, ContentArrangement, Table};
use fitstat_core::{
    aggregate_by_user, aggregate_with, import, summarize_metric, AggregateOptions, Bucket,
    Granularity, Metric, SummaryStatistics,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Where the records for an analytics run come from.
pub enum RecordSource {
    User(i64),
    File(PathBuf),
}

pub fn run_analytics(
    db: &Path,
    source: RecordSource,
    granularity: Granularity,
    metric: Metric,
    options: AggregateOptions,
    json: bool,
) -> Result<()> {
    let start = Instant::now();
    let records = match &source {
        RecordSource::User(user_id) => {
            let store = open_store(db)?;
            if store.get_user(*user_id)?.is_none() {
                return Err(anyhow!("User {} not found", user_id));
            }
            store.activities_for_user(*user_id)?
        }
        RecordSource::File(path) => import::load_file(path)?,
    };

    let buckets = aggregate_with(&records, granularity, &options)?;
    let summary = summarize_metric(&buckets, metric);
    debug!(
        buckets = buckets.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "analytics ready"
    );

    if json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct AnalyticsJson<'a> {
            granularity: Granularity,
            metric: Metric,
            week_start: String,
            buckets: &'a [Bucket],
            summary: Option<SummaryStatistics>,
        }

        let output = AnalyticsJson {
            granularity,
            metric,
            week_start: options.week_start.to_string(),
            buckets: &buckets,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let title = match &source {
        RecordSource::User(user_id) => format!("user {}", user_id),
        RecordSource::File(path) => path.display().to_string(),
    };
    println!(
        "\n  {}\n",
        format!("Activity by {} period for {}", granularity.as_str(), title).cyan()
    );

    if buckets.is_empty() {
        println!("  {}\n", "No data available".bright_black());
        return Ok(());
    }

    println!("{}", bucket_table(&buckets));

    if let Some(summary) = summary {
        println!(
            "\n  {} current {} | average {} | max {} | min {}",
            format!("{}:", metric).bold(),
            format_value(summary.current),
            format_value(summary.average),
            format_value(summary.maximum),
            format_value(summary.minimum)
        );
    }
    println!();

    Ok(())
}

/// Per-user summaries across the whole database, aggregated in parallel.
pub fn run_overview(
    db: &Path,
    granularity: Granularity,
    metric: Metric,
    options: AggregateOptions,
    json: bool,
) -> Result<()> {
    let store = open_store(db)?;
    let users: BTreeMap<i64, String> = store
        .list_users()?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();
    let histories = store.all_activities()?;
    let results = aggregate_by_user(&histories, granularity, &options);

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct UserOverviewJson {
        user_id: i64,
        username: String,
        records: usize,
        buckets: usize,
        summary: Option<SummaryStatistics>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    }

    let entries: Vec<UserOverviewJson> = users
        .iter()
        .map(|(user_id, username)| {
            let records = histories.get(user_id).map_or(0, Vec::len);
            let (buckets, summary, error) = match results.get(user_id) {
                Some(Ok(buckets)) => (buckets.len(), summarize_metric(buckets, metric), None),
                Some(Err(e)) => {
                    warn!(user_id, error = %e, "skipping user with invalid activity data");
                    (0, None, Some(e.to_string()))
                }
                None => (0, None, None),
            };
            UserOverviewJson {
                user_id: *user_id,
                username: username.clone(),
                records,
                buckets,
                summary,
                error,
            }
        })
        .collect();

    if json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct OverviewJson {
            granularity: Granularity,
            metric: Metric,
            users: Vec<UserOverviewJson>,
        }

        let output = OverviewJson {
            granularity,
            metric,
            users: entries,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("\n  {}\n", "No users found".bright_black());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "User", "Records", "Periods", "Current", "Average", "Max", "Min",
    ]);

    for entry in &entries {
        let mut row = vec![
            Cell::new(&entry.username),
            Cell::new(format_number(entry.records as i64)),
            Cell::new(entry.buckets),
        ];
        match (&entry.summary, &entry.error) {
            (Some(s), _) => row.extend([
                Cell::new(format_value(s.current)),
                Cell::new(format_value(s.average)),
                Cell::new(format_value(s.maximum)),
                Cell::new(format_value(s.minimum)),
            ]),
            (None, Some(_)) => row.push(Cell::new("invalid data")),
            (None, None) => row.push(Cell::new("-")),
        }
        table.add_row(row);
    }

    println!(
        "\n  {}\n",
        format!("{} by {} period", metric, granularity.as_str()).cyan()
    );
    println!("{table}\n");

    Ok(())
}

fn bucket_table(buckets: &[Bucket]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Period", "Key", "Steps", "Calories", "Standing", "Distance (km)", "Records",
    ]);

    for bucket in buckets {
        table.add_row(vec![
            bucket.label.clone(),
            bucket.bucket_key.to_string(),
            format_number(bucket.steps_avg),
            format_value(bucket.calories_avg),
            format_value(bucket.standing_hours_avg),
            format!("{:.2}", bucket.distance_km_avg),
            bucket.record_count.to_string(),
        ]);
    }

    table
}
