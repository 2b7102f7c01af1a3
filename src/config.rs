use anyhow::{bail, Result};
use chrono_tz::Tz;
use std::env;
use std::path::Path;

use crate::calendar::DEFAULT_TIMEZONE;

#[derive(Debug, Clone)]
pub struct Config {
    // Input CSV paths
    pub store_status_csv: String,
    pub business_hours_csv: String,
    pub timezones_csv: String,

    // Where report artifacts are written
    pub reports_dir: String,

    // Fallback zone for stores with no (or unresolvable) timezone
    pub default_timezone: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            store_status_csv: get("STORE_STATUS_CSV")
                .unwrap_or_else(|| "data/store_status.csv".to_string()),
            business_hours_csv: get("BUSINESS_HOURS_CSV")
                .unwrap_or_else(|| "data/business_hours.csv".to_string()),
            timezones_csv: get("TIMEZONES_CSV")
                .unwrap_or_else(|| "data/timezones.csv".to_string()),

            reports_dir: get("REPORTS_DIR").unwrap_or_else(|| "generated_reports".to_string()),

            default_timezone: get("DEFAULT_TIMEZONE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &std::collections::HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        for (name, path) in [
            ("STORE_STATUS_CSV", &self.store_status_csv),
            ("BUSINESS_HOURS_CSV", &self.business_hours_csv),
            ("TIMEZONES_CSV", &self.timezones_csv),
        ] {
            if !Path::new(path).exists() {
                errors.push(format!("{} '{}' not found.", name, path));
            }
        }

        if self.default_timezone.parse::<Tz>().is_err() {
            errors.push(format!(
                "DEFAULT_TIMEZONE '{}' is not a valid IANA zone name.",
                self.default_timezone
            ));
        }

        if self.reports_dir.trim().is_empty() {
            errors.push("REPORTS_DIR cannot be empty.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }
}
