use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Weekday;
use fitstat_core::{AggregateOptions, Granularity};
use serde::Deserialize;
use tracing::warn;

static CONFIG: OnceLock<FitstatConfig> = OnceLock::new();

/// Environment variable naming the database file.
pub const DB_ENV_VAR: &str = "FITSTAT_DB";

/// Settings read from `~/.fitstat` (TOML). Command-line flags win over
/// anything set here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FitstatConfig {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub week_start: Option<String>,
    #[serde(default)]
    pub daily_window: Option<usize>,
    #[serde(default)]
    pub default_granularity: Option<String>,
}

impl FitstatConfig {
    fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".fitstat"))
    }

    pub fn load() -> &'static FitstatConfig {
        CONFIG.get_or_init(|| {
            Self::config_path()
                .map(|path| Self::load_from(&path))
                .unwrap_or_default()
        })
    }

    fn load_from(path: &Path) -> FitstatConfig {
        let Ok(content) = fs::read_to_string(path) else {
            return FitstatConfig::default();
        };
        toml::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
            FitstatConfig::default()
        })
    }

    /// Flag, then `FITSTAT_DB`, then the config file, then the user data dir.
    pub fn database_path(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| std::env::var_os(DB_ENV_VAR).map(PathBuf::from))
            .or_else(|| self.db_path.clone())
            .or_else(|| dirs::data_dir().map(|d| d.join("fitstat").join("fitstat.db")))
            .unwrap_or_else(|| PathBuf::from("fitstat.db"))
    }

    pub fn granularity(&self, flag: Option<Granularity>) -> Granularity {
        flag.or_else(|| {
            self.default_granularity
                .as_deref()
                .and_then(|raw| match raw.parse() {
                    Ok(granularity) => Some(granularity),
                    Err(e) => {
                        warn!(error = %e, "ignoring default_granularity from config");
                        None
                    }
                })
        })
        .unwrap_or(Granularity::Daily)
    }

    pub fn aggregate_options(&self, week_start: Option<Weekday>) -> AggregateOptions {
        let defaults = AggregateOptions::default();

        let week_start = week_start
            .or_else(|| {
                self.week_start
                    .as_deref()
                    .and_then(|raw| match raw.parse::<Weekday>() {
                        Ok(day) => Some(day),
                        Err(_) => {
                            warn!(value = raw, "ignoring week_start from config");
                            None
                        }
                    })
            })
            .unwrap_or(defaults.week_start);

        let daily_window = match self.daily_window {
            Some(0) => {
                warn!("daily_window must be at least 1, using default");
                defaults.daily_window
            }
            Some(window) => window,
            None => defaults.daily_window,
        };

        AggregateOptions {
            week_start,
            daily_window,
        }
    }
}
