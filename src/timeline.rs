//! Status timeline reconstruction
//!
//! Turns sparse point-in-time observations into a gap-free sequence of
//! half-open segments covering a requested UTC window. Status before the
//! first observation and after the last is extrapolated from the nearest
//! observation, with unlimited reach.

use chrono::{DateTime, Utc};

use crate::model::{Status, StatusObservation, TimelineSegment};

/// Reconstruct the status timeline over `[window_start, window_end)`.
///
/// Returns `None` when there are no observations at all (the "no data"
/// marker; the aggregator treats it specially). Otherwise the returned
/// segments are ordered, contiguous, non-overlapping, and exactly tile the
/// window. `observations` must be sorted ascending by timestamp.
pub fn reconstruct(
    observations: &[StatusObservation],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Option<Vec<TimelineSegment>> {
    let first = observations.first()?;
    let last = observations.last()?;

    let mut segments = Vec::with_capacity(observations.len() + 1);

    // Backward extrapolation: the first observation's status holds before it
    if window_start < first.timestamp_utc {
        push_clipped(
            &mut segments,
            window_start,
            first.timestamp_utc,
            first.status,
            window_start,
            window_end,
        );
    }

    for pair in observations.windows(2) {
        push_clipped(
            &mut segments,
            pair[0].timestamp_utc,
            pair[1].timestamp_utc,
            pair[0].status,
            window_start,
            window_end,
        );
    }

    // Forward extrapolation: the last observation's status holds after it
    if last.timestamp_utc < window_end {
        push_clipped(
            &mut segments,
            last.timestamp_utc,
            window_end,
            last.status,
            window_start,
            window_end,
        );
    }

    Some(segments)
}

/// Clip `[start, end)` to the window and keep it only if non-empty.
fn push_clipped(
    out: &mut Vec<TimelineSegment>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: Status,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) {
    let start = start.max(window_start);
    let end = end.min(window_end);
    if start < end {
        out.push(TimelineSegment {
            start_utc: start,
            end_utc: end,
            status,
        });
    }
}
