//! Business-hours calendar evaluation
//!
//! Decides whether a UTC instant falls inside a store's business hours,
//! using the store's weekly local-time rules and IANA timezone.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::model::BusinessHourRule;

/// Fallback zone when a store has no timezone on record or the recorded
/// name does not resolve.
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// Resolve an IANA zone name, substituting `default` when it is invalid.
pub fn resolve_zone(name: &str, default: Tz) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            debug!("Unresolvable timezone '{}', using {}", name, default);
            default
        }
    }
}

/// One store's calendar: its business-hour rules plus resolved timezone.
///
/// A store with no rules is always open.
#[derive(Debug, Clone)]
pub struct StoreCalendar<'a> {
    rules: &'a [BusinessHourRule],
    tz: Tz,
}

impl<'a> StoreCalendar<'a> {
    pub fn new(rules: &'a [BusinessHourRule], tz: Tz) -> Self {
        Self { rules, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn always_open(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `instant` falls inside business hours.
    ///
    /// UTC-to-local conversion is total (never ambiguous), so this is a pure
    /// function of the instant, rules, and zone.
    pub fn is_business_instant(&self, instant: DateTime<Utc>) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let local = self.tz.from_utc_datetime(&instant.naive_utc());
        // Monday = 0, matching the ingested day_of_week encoding
        let weekday = local.weekday().num_days_from_monday() as u8;
        let time = local.time();
        self.rules
            .iter()
            .any(|rule| rule.day_of_week == weekday && rule.matches_time(time))
    }
}

/// Convert a naive local wall-clock time in `zone` to UTC.
///
/// DST transitions are resolved deterministically:
/// - ambiguous local times take the pre-transition (earliest) offset,
/// - non-existent local times are shifted forward one hour before localizing,
/// - invalid zone names fall back to `default`.
pub fn local_to_utc(local: NaiveDateTime, zone: &str, default: Tz) -> DateTime<Utc> {
    localize(resolve_zone(zone, default), local)
}

fn localize(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(pre_transition, _) => pre_transition.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = local + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) => dt.with_timezone(&Utc),
                LocalResult::Ambiguous(pre_transition, _) => pre_transition.with_timezone(&Utc),
                // Spring-forward gaps are one hour wide, so the shifted time
                // always resolves; treat anything else as already-UTC.
                LocalResult::None => Utc.from_utc_datetime(&shifted),
            }
        }
    }
}
