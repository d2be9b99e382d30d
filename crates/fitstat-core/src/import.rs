//! Loading activity records from exported files

use crate::ActivityRecord;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON activity feed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid CSV activity file: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported activity file '{0}' (expected .json or .csv)")]
    UnsupportedFormat(PathBuf),
    #[error("record {index} has invalid {field}: {value}")]
    InvalidRecord {
        index: usize,
        field: &'static str,
        value: f64,
    },
}

/// Either the `{message, data}` API envelope or a bare record array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ActivityFeed {
    Envelope {
        #[serde(default)]
        message: Option<String>,
        data: Vec<ActivityRecord>,
    },
    Records(Vec<ActivityRecord>),
}

pub fn parse_json(content: &str) -> Result<Vec<ActivityRecord>, ImportError> {
    let records = match serde_json::from_str::<ActivityFeed>(content)? {
        ActivityFeed::Envelope { message, data } => {
            debug!(?message, count = data.len(), "parsed activity envelope");
            data
        }
        ActivityFeed::Records(records) => records,
    };
    check_records(records)
}

/// Parse CSV with a header row naming the record fields. Unknown columns
/// are ignored.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<ActivityRecord>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let records = rdr
        .deserialize::<ActivityRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    check_records(records)
}

/// Reject records carrying negative, NaN or infinite metrics.
fn check_records(records: Vec<ActivityRecord>) -> Result<Vec<ActivityRecord>, ImportError> {
    for (index, record) in records.iter().enumerate() {
        record
            .check_metrics()
            .map_err(|e| ImportError::InvalidRecord {
                index,
                field: e.field,
                value: e.value,
            })?;
    }
    Ok(records)
}

pub fn load_file(path: &Path) -> Result<Vec<ActivityRecord>, ImportError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    let io_error = |source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let records = match extension.as_deref() {
        Some("json") => parse_json(&fs::read_to_string(path).map_err(io_error)?)?,
        Some("csv") => parse_csv(BufReader::new(File::open(path).map_err(io_error)?))?,
        _ => return Err(ImportError::UnsupportedFormat(path.to_path_buf())),
    };

    debug!(path = %path.display(), count = records.len(), "imported activity records");
    Ok(records)
}
