//! CSV ingestion boundary
//!
//! Loads the three input files (store status polls, business hours,
//! timezones) into the dataset. Column lookup is header-indexed and
//! case-insensitive. Malformed rows are skipped with a warning; only
//! structural problems (unreadable file, missing header column) are errors.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tracing::warn;

use crate::dataset::Dataset;
use crate::model::{BusinessHourRule, Status, StatusObservation};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: String, column: &'static str },
}

/// Per-file load outcome, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadCounts {
    pub loaded: usize,
    pub skipped: usize,
}

/// Parse a feed timestamp: `%Y-%m-%d %H:%M:%S` with optional fractional
/// seconds and optional trailing ` UTC`.
pub fn parse_utc_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim().trim_end_matches(" UTC").trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

fn parse_local_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S").ok()
}

fn read_file(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Map lowercased header names to column positions.
fn header_index(header_line: &str) -> HashMap<String, usize> {
    header_line
        .split(',')
        .enumerate()
        .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
        .collect()
}

fn require_column(
    index: &HashMap<String, usize>,
    path: &str,
    column: &'static str,
) -> Result<usize, IngestError> {
    index.get(column).copied().ok_or(IngestError::MissingColumn {
        path: path.to_string(),
        column,
    })
}

fn field<'a>(parts: &'a [&'a str], i: usize) -> Option<&'a str> {
    let value = parts.get(i)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Load store status polls (`store_id,timestamp_utc,status`).
pub fn load_store_status(dataset: &mut Dataset, path: &Path) -> Result<LoadCounts, IngestError> {
    let src = read_file(path)?;
    load_store_status_str(dataset, &src, &path.display().to_string())
}

/// String-slice variant for tests (no filesystem).
pub fn load_store_status_str(
    dataset: &mut Dataset,
    src: &str,
    path: &str,
) -> Result<LoadCounts, IngestError> {
    let mut lines = src.lines();
    let Some(header) = lines.next() else {
        return Ok(LoadCounts::default());
    };
    let index = header_index(header);
    let store_col = require_column(&index, path, "store_id")?;
    let ts_col = require_column(&index, path, "timestamp_utc")?;
    let status_col = require_column(&index, path, "status")?;

    let mut counts = LoadCounts::default();
    for (row_num, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        let parsed = (|| {
            let store_id = field(&parts, store_col)?;
            let timestamp_utc = parse_utc_timestamp(field(&parts, ts_col)?)?;
            let status = Status::parse(field(&parts, status_col)?)?;
            Some(StatusObservation {
                store_id: store_id.to_string(),
                timestamp_utc,
                status,
            })
        })();

        match parsed {
            Some(observation) => {
                dataset.add_observation(observation);
                counts.loaded += 1;
            }
            None => {
                warn!("Skipping malformed store status row {} in {}", row_num + 2, path);
                counts.skipped += 1;
            }
        }
    }
    Ok(counts)
}

/// Load business hours (`store_id,dayOfWeek,start_time_local,end_time_local`).
pub fn load_business_hours(dataset: &mut Dataset, path: &Path) -> Result<LoadCounts, IngestError> {
    let src = read_file(path)?;
    load_business_hours_str(dataset, &src, &path.display().to_string())
}

pub fn load_business_hours_str(
    dataset: &mut Dataset,
    src: &str,
    path: &str,
) -> Result<LoadCounts, IngestError> {
    let mut lines = src.lines();
    let Some(header) = lines.next() else {
        return Ok(LoadCounts::default());
    };
    let index = header_index(header);
    let store_col = require_column(&index, path, "store_id")?;
    let day_col = require_column(&index, path, "dayofweek")?;
    let start_col = require_column(&index, path, "start_time_local")?;
    let end_col = require_column(&index, path, "end_time_local")?;

    let mut counts = LoadCounts::default();
    for (row_num, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        let parsed = (|| {
            let store_id = field(&parts, store_col)?;
            let day_of_week: u8 = field(&parts, day_col)?.parse().ok()?;
            if day_of_week > 6 {
                return None;
            }
            let start_time_local = parse_local_time(field(&parts, start_col)?)?;
            let end_time_local = parse_local_time(field(&parts, end_col)?)?;
            Some(BusinessHourRule {
                store_id: store_id.to_string(),
                day_of_week,
                start_time_local,
                end_time_local,
            })
        })();

        match parsed {
            Some(rule) => {
                dataset.add_business_hours(rule);
                counts.loaded += 1;
            }
            None => {
                warn!("Skipping malformed business hours row {} in {}", row_num + 2, path);
                counts.skipped += 1;
            }
        }
    }
    Ok(counts)
}

/// Load timezones (`store_id,timezone_str`). A row with an empty zone still
/// counts as loaded; the store falls back to the default zone at query time.
pub fn load_timezones(dataset: &mut Dataset, path: &Path) -> Result<LoadCounts, IngestError> {
    let src = read_file(path)?;
    load_timezones_str(dataset, &src, &path.display().to_string())
}

pub fn load_timezones_str(
    dataset: &mut Dataset,
    src: &str,
    path: &str,
) -> Result<LoadCounts, IngestError> {
    let mut lines = src.lines();
    let Some(header) = lines.next() else {
        return Ok(LoadCounts::default());
    };
    let index = header_index(header);
    let store_col = require_column(&index, path, "store_id")?;
    let zone_col = require_column(&index, path, "timezone_str")?;

    let mut counts = LoadCounts::default();
    for (row_num, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        match field(&parts, store_col) {
            Some(store_id) => {
                let zone = field(&parts, zone_col).unwrap_or("");
                dataset.set_timezone(store_id, zone.to_string());
                counts.loaded += 1;
            }
            None => {
                warn!("Skipping malformed timezone row {} in {}", row_num + 2, path);
                counts.skipped += 1;
            }
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Chicago;

    fn dataset() -> Dataset {
        Dataset::new(Chicago)
    }

    #[test]
    fn test_parse_utc_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 25, 18, 13, 22).unwrap();
        assert_eq!(
            parse_utc_timestamp("2023-01-25 18:13:22 UTC"),
            Some(expected)
        );
        assert_eq!(parse_utc_timestamp("2023-01-25 18:13:22"), Some(expected));
        let with_micros = parse_utc_timestamp("2023-01-25 18:13:22.479220 UTC").unwrap();
        assert_eq!(with_micros.timestamp_subsec_micros(), 479_220);
        assert_eq!(parse_utc_timestamp("not a timestamp"), None);
        assert_eq!(parse_utc_timestamp(""), None);
    }

    #[test]
    fn test_load_store_status_basic() {
        let mut ds = dataset();
        let src = "store_id,timestamp_utc,status\n\
                   s1,2023-01-25 10:00:00 UTC,active\n\
                   s1,2023-01-25 11:00:00.123456 UTC,inactive\n\
                   s2,2023-01-25 10:30:00,active\n";
        let counts = load_store_status_str(&mut ds, src, "test.csv").unwrap();
        assert_eq!(counts, LoadCounts { loaded: 3, skipped: 0 });
        assert_eq!(ds.store_ids(), ["s1".to_string(), "s2".to_string()]);
        assert_eq!(ds.observation_count(), 3);
    }

    #[test]
    fn test_load_store_status_skips_malformed() {
        let mut ds = dataset();
        let src = "store_id,timestamp_utc,status\n\
                   s1,2023-01-25 10:00:00 UTC,active\n\
                   ,2023-01-25 10:00:00 UTC,active\n\
                   s1,not-a-timestamp,active\n\
                   s1,2023-01-25 11:00:00 UTC,unknown\n\
                   s1,2023-01-25 12:00:00 UTC\n";
        let counts = load_store_status_str(&mut ds, src, "test.csv").unwrap();
        assert_eq!(counts.loaded, 1);
        assert_eq!(counts.skipped, 4);
    }

    #[test]
    fn test_load_store_status_missing_column() {
        let mut ds = dataset();
        let src = "store_id,status\ns1,active\n";
        let err = load_store_status_str(&mut ds, src, "test.csv").unwrap_err();
        assert!(matches!(
            err,
            IngestError::MissingColumn { column: "timestamp_utc", .. }
        ));
    }

    #[test]
    fn test_load_store_status_headers_case_insensitive() {
        let mut ds = dataset();
        let src = "Store_ID, Timestamp_UTC ,STATUS\ns1,2023-01-25 10:00:00 UTC,active\n";
        let counts = load_store_status_str(&mut ds, src, "test.csv").unwrap();
        assert_eq!(counts.loaded, 1);
    }

    #[test]
    fn test_load_business_hours_basic() {
        let mut ds = dataset();
        let src = "store_id,dayOfWeek,start_time_local,end_time_local\n\
                   s1,0,09:00:00,17:00:00\n\
                   s1,1,22:00:00,06:00:00\n";
        let counts = load_business_hours_str(&mut ds, src, "bh.csv").unwrap();
        assert_eq!(counts, LoadCounts { loaded: 2, skipped: 0 });
        let rules = ds.rules_for("s1");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].day_of_week, 0);
        // Wrapping rule survives the load intact
        assert!(rules[1].start_time_local > rules[1].end_time_local);
    }

    #[test]
    fn test_load_business_hours_skips_bad_rows() {
        let mut ds = dataset();
        let src = "store_id,dayOfWeek,start_time_local,end_time_local\n\
                   s1,7,09:00:00,17:00:00\n\
                   s1,monday,09:00:00,17:00:00\n\
                   s1,0,9am,17:00:00\n\
                   s1,0,09:00:00,17:00:00\n";
        let counts = load_business_hours_str(&mut ds, src, "bh.csv").unwrap();
        assert_eq!(counts.loaded, 1);
        assert_eq!(counts.skipped, 3);
    }

    #[test]
    fn test_load_timezones_empty_zone_counts_as_loaded() {
        let mut ds = dataset();
        let src = "store_id,timezone_str\n\
                   s1,America/New_York\n\
                   s2,\n\
                   ,America/Denver\n";
        let counts = load_timezones_str(&mut ds, src, "tz.csv").unwrap();
        assert_eq!(counts.loaded, 2);
        assert_eq!(counts.skipped, 1);
        assert_eq!(ds.timezone_name_for("s1"), "America/New_York");
        // Empty zone falls back to the default at query time
        assert_eq!(ds.timezone_name_for("s2"), "America/Chicago");
    }

    #[test]
    fn test_empty_files() {
        let mut ds = dataset();
        assert_eq!(
            load_store_status_str(&mut ds, "", "empty.csv").unwrap(),
            LoadCounts::default()
        );
        assert_eq!(
            load_timezones_str(&mut ds, "store_id,timezone_str\n", "tz.csv").unwrap(),
            LoadCounts::default()
        );
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let mut ds = dataset();
        let err = load_store_status(&mut ds, Path::new("/nonexistent/status.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
