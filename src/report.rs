//! Uptime/downtime aggregation and report assembly
//!
//! The window aggregator intersects the reconstructed status timeline with
//! the business-hours calendar at one-minute resolution: each bucket is
//! classified once at its midpoint and its whole duration attributed on
//! that classification. The approximation is off by at most +/-30s per
//! business-hour boundary per window, in exchange for a linear scan.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::calendar::StoreCalendar;
use crate::dataset::Dataset;
use crate::model::{ReportRow, Status, TimelineSegment, WindowKind, WindowResult};
use crate::timeline;

/// Header of the report artifact; field order is part of the contract.
pub const CSV_HEADER: &str = "store_id,uptime_last_hour,uptime_last_day,uptime_last_week,\
                              downtime_last_hour,downtime_last_day,downtime_last_week";

/// Walk `[start, end)` in one-minute buckets (the final bucket truncated to
/// the boundary), visiting each bucket's midpoint and duration in seconds.
fn bucket_scan<F>(start: DateTime<Utc>, end: DateTime<Utc>, mut visit: F)
where
    F: FnMut(DateTime<Utc>, f64),
{
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + Duration::minutes(1)).min(end);
        let span = next - cursor;
        let seconds = span.num_milliseconds() as f64 / 1000.0;
        if seconds <= 0.0 {
            break;
        }
        visit(cursor + span / 2, seconds);
        cursor = next;
    }
}

/// Integrate uptime/downtime seconds for one store over one window.
///
/// `timeline` is `None` when the store has no observations in range: the
/// no-data fallback counts every business bucket as uptime (reference
/// behavior, preserved for compatibility).
pub fn aggregate_window(
    calendar: &StoreCalendar<'_>,
    timeline: Option<&[TimelineSegment]>,
    store_id: &str,
    kind: WindowKind,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> WindowResult {
    let mut total_business_seconds = 0.0;
    bucket_scan(window_start, window_end, |midpoint, seconds| {
        if calendar.is_business_instant(midpoint) {
            total_business_seconds += seconds;
        }
    });

    let observed_uptime_seconds = match timeline {
        None => total_business_seconds,
        Some(segments) => {
            let mut uptime = 0.0;
            for segment in segments.iter().filter(|s| s.status == Status::Active) {
                // Bucket cursor restarts at each segment boundary; buckets
                // deliberately do not align across segments.
                let start = segment.start_utc.max(window_start);
                let end = segment.end_utc.min(window_end);
                if start >= end {
                    continue;
                }
                bucket_scan(start, end, |midpoint, seconds| {
                    if calendar.is_business_instant(midpoint) {
                        uptime += seconds;
                    }
                });
            }
            uptime
        }
    };

    let (uptime_seconds, downtime_seconds) = if total_business_seconds > 0.0 {
        let uptime = observed_uptime_seconds.min(total_business_seconds);
        (uptime, total_business_seconds - uptime)
    } else {
        (0.0, 0.0)
    };

    WindowResult {
        store_id: store_id.to_string(),
        window_kind: kind,
        uptime_seconds,
        downtime_seconds,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the full report row for one store at reference instant `now`.
pub fn store_row(dataset: &Dataset, store_id: &str, now: DateTime<Utc>) -> ReportRow {
    let calendar = dataset.calendar_for(store_id);

    let mut row = ReportRow {
        store_id: store_id.to_string(),
        uptime_last_hour: 0.0,
        uptime_last_day: 0.0,
        uptime_last_week: 0.0,
        downtime_last_hour: 0.0,
        downtime_last_day: 0.0,
        downtime_last_week: 0.0,
    };

    for kind in WindowKind::ALL {
        let window_start = now - kind.duration();
        let observations = dataset.observations_between(store_id, window_start, now);
        let segments = timeline::reconstruct(observations, window_start, now);
        let result = aggregate_window(
            &calendar,
            segments.as_deref(),
            store_id,
            kind,
            window_start,
            now,
        );

        let uptime = round2(kind.to_reported_unit(result.uptime_seconds));
        let downtime = round2(kind.to_reported_unit(result.downtime_seconds));
        match kind {
            WindowKind::LastHour => {
                row.uptime_last_hour = uptime;
                row.downtime_last_hour = downtime;
            }
            WindowKind::LastDay => {
                row.uptime_last_day = uptime;
                row.downtime_last_day = downtime;
            }
            WindowKind::LastWeek => {
                row.uptime_last_week = uptime;
                row.downtime_last_week = downtime;
            }
        }
    }

    row
}

/// Build report rows for every known store, in the dataset's store order.
/// An empty store set yields an empty report.
pub fn build_report(dataset: &Dataset, now: DateTime<Utc>) -> Vec<ReportRow> {
    debug!(
        "Building report for {} stores at reference time {}",
        dataset.store_ids().len(),
        now
    );
    dataset
        .store_ids()
        .iter()
        .map(|store_id| store_row(dataset, store_id, now))
        .collect()
}

/// Render rows as the CSV artifact: header plus one line per store, two
/// decimal places throughout.
pub fn render_csv(rows: &[ReportRow]) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2}\n",
            row.store_id,
            row.uptime_last_hour,
            row.uptime_last_day,
            row.uptime_last_week,
            row.downtime_last_hour,
            row.downtime_last_day,
            row.downtime_last_week,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BusinessHourRule, StatusObservation};
    use chrono::{NaiveTime, TimeZone};
    use chrono_tz::America::{Chicago, New_York};

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, d, h, m, 0).unwrap()
    }

    fn rule(day: u8, start: (u32, u32), end: (u32, u32)) -> BusinessHourRule {
        BusinessHourRule {
            store_id: "store1".to_string(),
            day_of_week: day,
            start_time_local: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time_local: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    fn obs(ts: DateTime<Utc>, status: Status) -> StatusObservation {
        StatusObservation {
            store_id: "store1".to_string(),
            timestamp_utc: ts,
            status,
        }
    }

    #[test]
    fn test_always_open_total_equals_window_length() {
        let calendar = StoreCalendar::new(&[], Chicago);
        // Active the whole hour
        let segments = [TimelineSegment {
            start_utc: ts(23, 9, 0),
            end_utc: ts(23, 10, 0),
            status: Status::Active,
        }];
        let result = aggregate_window(
            &calendar,
            Some(&segments),
            "store1",
            WindowKind::LastHour,
            ts(23, 9, 0),
            ts(23, 10, 0),
        );
        assert_eq!(result.uptime_seconds, 3600.0);
        assert_eq!(result.downtime_seconds, 0.0);
    }

    #[test]
    fn test_no_data_fallback_counts_business_time_as_uptime() {
        let calendar = StoreCalendar::new(&[], Chicago);
        let result = aggregate_window(
            &calendar,
            None,
            "store1",
            WindowKind::LastHour,
            ts(23, 9, 0),
            ts(23, 10, 0),
        );
        assert_eq!(result.uptime_seconds, 3600.0);
        assert_eq!(result.downtime_seconds, 0.0);
    }

    #[test]
    fn test_fully_inactive_store_is_all_downtime() {
        let calendar = StoreCalendar::new(&[], Chicago);
        let segments = [TimelineSegment {
            start_utc: ts(23, 9, 0),
            end_utc: ts(23, 10, 0),
            status: Status::Inactive,
        }];
        let result = aggregate_window(
            &calendar,
            Some(&segments),
            "store1",
            WindowKind::LastHour,
            ts(23, 9, 0),
            ts(23, 10, 0),
        );
        assert_eq!(result.uptime_seconds, 0.0);
        assert_eq!(result.downtime_seconds, 3600.0);
    }

    #[test]
    fn test_zero_business_time_yields_zeros() {
        // 2023-01-23 is a Monday; a Tuesday-only rule leaves the whole
        // Monday window outside business hours
        let rules = [rule(1, (9, 0), (17, 0))];
        let calendar = StoreCalendar::new(&rules, New_York);
        let result = aggregate_window(
            &calendar,
            None,
            "store1",
            WindowKind::LastHour,
            ts(23, 15, 0),
            ts(23, 16, 0),
        );
        assert_eq!(result.uptime_seconds, 0.0);
        assert_eq!(result.downtime_seconds, 0.0);
    }

    #[test]
    fn test_uptime_clamped_to_business_total() {
        // Business hours cover only half the window; the store is active
        // throughout, so observed uptime is clamped to the business total.
        // Monday 09:00-17:00 New York == 14:00-22:00 UTC in January.
        let rules = [rule(0, (9, 0), (10, 0))];
        let calendar = StoreCalendar::new(&rules, New_York);
        let segments = [TimelineSegment {
            start_utc: ts(23, 14, 0),
            end_utc: ts(23, 16, 0),
            status: Status::Active,
        }];
        let result = aggregate_window(
            &calendar,
            Some(&segments),
            "store1",
            WindowKind::LastHour,
            ts(23, 14, 0),
            ts(23, 16, 0),
        );
        // Business time is 14:00-15:00 UTC only
        assert_eq!(result.uptime_seconds, 3600.0);
        assert_eq!(result.downtime_seconds, 0.0);
    }

    #[test]
    fn test_store_row_business_day_split() {
        // Monday 2023-01-23, New York (EST, UTC-5), rule 09:00-17:00 local.
        // Observations: inactive 08:00, active 09:30, inactive 14:00 local.
        // Expected: uptime 09:30-14:00 = 4.5h, downtime 3.5h of the 8h day.
        let mut ds = Dataset::new(Chicago);
        ds.set_timezone("store1", "America/New_York".to_string());
        ds.add_business_hours(rule(0, (9, 0), (17, 0)));
        ds.add_observation(obs(ts(23, 13, 0), Status::Inactive)); // 08:00 local
        ds.add_observation(obs(ts(23, 14, 30), Status::Active)); // 09:30 local
        ds.add_observation(obs(ts(23, 19, 0), Status::Inactive)); // 14:00 local
        ds.finalize();

        // now = Monday midnight local Tuesday = 05:00 UTC Tue; the last-day
        // window then covers the whole business day
        let now = ts(24, 5, 0);
        let row = store_row(&ds, "store1", now);

        assert!((row.uptime_last_day - 4.5).abs() <= 1.0 / 60.0 + 1e-9);
        assert!((row.downtime_last_day - 3.5).abs() <= 1.0 / 60.0 + 1e-9);
        // Conservation: uptime + downtime == business total (8h)
        assert!((row.uptime_last_day + row.downtime_last_day - 8.0).abs() <= 1e-9);
    }

    #[test]
    fn test_store_row_backward_extrapolation_counts_first_status() {
        // Same day, but with no observation before 09:30: the first
        // observation's status extrapolates backward with unlimited reach,
        // so 09:00-09:30 also counts as uptime.
        let mut ds = Dataset::new(Chicago);
        ds.set_timezone("store1", "America/New_York".to_string());
        ds.add_business_hours(rule(0, (9, 0), (17, 0)));
        ds.add_observation(obs(ts(23, 14, 30), Status::Active)); // 09:30 local
        ds.add_observation(obs(ts(23, 19, 0), Status::Inactive)); // 14:00 local
        ds.finalize();

        let now = ts(24, 5, 0);
        let row = store_row(&ds, "store1", now);

        assert!((row.uptime_last_day - 5.0).abs() <= 1.0 / 60.0 + 1e-9);
        assert!((row.downtime_last_day - 3.0).abs() <= 1.0 / 60.0 + 1e-9);
    }

    #[test]
    fn test_store_row_no_observations_in_window_full_uptime() {
        let mut ds = Dataset::new(Chicago);
        // One observation far outside every window. The driver fetches only
        // observations inside each window, so this store hits the no-data
        // fallback and is assumed fully active for all business time.
        ds.add_observation(obs(ts(1, 0, 0), Status::Inactive));
        ds.finalize();

        let now = Utc.with_ymd_and_hms(2023, 3, 15, 0, 0, 0).unwrap();
        let row = store_row(&ds, "store1", now);

        assert_eq!(row.uptime_last_week, 168.0);
        assert_eq!(row.downtime_last_week, 0.0);
        assert_eq!(row.uptime_last_hour, 60.0);
        assert_eq!(row.downtime_last_hour, 0.0);
    }

    #[test]
    fn test_build_report_empty_dataset() {
        let ds = Dataset::new(Chicago);
        let rows = build_report(&ds, ts(23, 12, 0));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_build_report_row_order_follows_store_order() {
        let mut ds = Dataset::new(Chicago);
        ds.add_observation(obs(ts(23, 9, 0), Status::Active));
        let mut second = obs(ts(23, 9, 0), Status::Active);
        second.store_id = "another".to_string();
        ds.add_observation(second);
        ds.finalize();

        let rows = build_report(&ds, ts(23, 12, 0));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].store_id, "store1");
        assert_eq!(rows[1].store_id, "another");
    }

    #[test]
    fn test_render_csv_format() {
        let rows = vec![ReportRow {
            store_id: "store1".to_string(),
            uptime_last_hour: 60.0,
            uptime_last_day: 24.0,
            uptime_last_week: 168.0,
            downtime_last_hour: 0.0,
            downtime_last_day: 0.0,
            downtime_last_week: 0.0,
        }];
        let csv = render_csv(&rows);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "store_id,uptime_last_hour,uptime_last_day,uptime_last_week,\
             downtime_last_hour,downtime_last_day,downtime_last_week"
        );
        assert_eq!(
            lines.next().unwrap(),
            "store1,60.00,24.00,168.00,0.00,0.00,0.00"
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_render_csv_header_only_when_no_rows() {
        let csv = render_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(4.499999), 4.5);
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(0.005), 0.01);
        assert_eq!(round2(168.0), 168.0);
    }
}
