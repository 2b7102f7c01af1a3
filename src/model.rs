//! Domain types shared across the report engine.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

/// Observed store status from a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    /// Parse a status field from the polling feed. Anything other than
    /// "active"/"inactive" (case-insensitive) is rejected.
    pub fn parse(raw: &str) -> Option<Status> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Status::Active),
            "inactive" => Some(Status::Inactive),
            _ => None,
        }
    }
}

/// A single timestamped up/down sample for a store.
///
/// Samples are irregular: gaps of arbitrary size between observations are
/// expected and handled by extrapolation in the timeline reconstructor.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusObservation {
    pub store_id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub status: Status,
}

/// One weekly business-hour window for a store, in local wall-clock time.
///
/// `start_time_local > end_time_local` means the window wraps past midnight.
/// A store with no rules at all is treated as always open.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessHourRule {
    pub store_id: String,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u8,
    pub start_time_local: NaiveTime,
    pub end_time_local: NaiveTime,
}

impl BusinessHourRule {
    /// Whether `t` falls inside this rule's window, ignoring the weekday.
    pub fn matches_time(&self, t: NaiveTime) -> bool {
        if self.start_time_local <= self.end_time_local {
            self.start_time_local <= t && t < self.end_time_local
        } else {
            // Wrapping rule (e.g. 22:00-06:00) covers both ends of the day
            t >= self.start_time_local || t < self.end_time_local
        }
    }
}

/// A contiguous stretch of the reconstructed status timeline.
/// Half-open: covers `[start_utc, end_utc)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineSegment {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub status: Status,
}

impl TimelineSegment {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_utc <= instant && instant < self.end_utc
    }
}

/// The three trailing report windows, all ending at the reference "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    LastHour,
    LastDay,
    LastWeek,
}

impl WindowKind {
    pub const ALL: [WindowKind; 3] = [
        WindowKind::LastHour,
        WindowKind::LastDay,
        WindowKind::LastWeek,
    ];

    pub fn duration(self) -> Duration {
        match self {
            WindowKind::LastHour => Duration::hours(1),
            WindowKind::LastDay => Duration::hours(24),
            WindowKind::LastWeek => Duration::days(7),
        }
    }

    /// Convert integrated seconds into the unit this window reports:
    /// minutes for the last hour, hours for the last day/week.
    pub fn to_reported_unit(self, seconds: f64) -> f64 {
        match self {
            WindowKind::LastHour => seconds / 60.0,
            WindowKind::LastDay | WindowKind::LastWeek => seconds / 3600.0,
        }
    }
}

/// Uptime/downtime for one store over one window, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResult {
    pub store_id: String,
    pub window_kind: WindowKind,
    pub uptime_seconds: f64,
    pub downtime_seconds: f64,
}

/// One output row of the report, values already converted and rounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub store_id: String,
    pub uptime_last_hour: f64,
    pub uptime_last_day: f64,
    pub uptime_last_week: f64,
    pub downtime_last_hour: f64,
    pub downtime_last_day: f64,
    pub downtime_last_week: f64,
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    fn any_time() -> NaiveTime {
        let h: u32 = kani::any();
        kani::assume(h < 24);
        let m: u32 = kani::any();
        kani::assume(m < 60);
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[kani::proof]
    fn rule_and_reversed_rule_partition_the_day() {
        let start = any_time();
        let end = any_time();
        kani::assume(start != end);

        let rule = BusinessHourRule {
            store_id: String::new(),
            day_of_week: 0,
            start_time_local: start,
            end_time_local: end,
        };
        let reversed = BusinessHourRule {
            store_id: String::new(),
            day_of_week: 0,
            start_time_local: end,
            end_time_local: start,
        };

        let t = any_time();
        kani::assert(
            rule.matches_time(t) != reversed.matches_time(t),
            "every instant belongs to exactly one side",
        );
    }

    #[kani::proof]
    fn empty_rule_matches_nothing() {
        let start = any_time();
        let rule = BusinessHourRule {
            store_id: String::new(),
            day_of_week: 0,
            start_time_local: start,
            end_time_local: start,
        };
        let t = any_time();
        kani::assert(!rule.matches_time(t), "zero-width window is empty");
    }
}
