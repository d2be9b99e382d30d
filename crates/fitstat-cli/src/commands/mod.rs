pub mod activity;
pub mod analytics;
pub mod catalog;

use anyhow::{Context, Result};
use fitstat_core::store::Store;
use std::fs;
use std::path::Path;

pub fn open_store(path: &Path) -> Result<Store> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create directory {}", parent.display()))?;
    }
    Store::open(path).with_context(|| format!("Could not open database {}", path.display()))
}

pub fn format_number(n: i64) -> String {
    let s = n.unsigned_abs().to_string();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut result = String::with_capacity(len + len / 3 + 1);
    if n < 0 {
        result.push('-');
    }
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(b as char);
    }
    result
}

/// Whole numbers print without decimals, everything else with up to two.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format_number(value as i64)
    } else {
        format!("{:.2}", value)
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{}%", value.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(-4500), "-4,500");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(2500.0), "2,500");
        assert_eq!(format_value(6.32), "6.32");
        assert_eq!(format_value(0.5), "0.50");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(74.6), "75%");
        assert_eq!(format_percent(100.0), "100%");
    }
}
