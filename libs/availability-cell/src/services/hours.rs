//! Pure interval math turning a weekly rule plus day-specific exceptions
//! into concrete free intervals for one date.

use chrono::{Datelike, NaiveDate, Weekday};

use shared_models::{AvailabilityException, TimeRange, WorkingHoursRule};

/// 0 = Sunday through 6 = Saturday, matching `WorkingHoursRule.day_of_week`.
pub fn day_of_week(date: NaiveDate) -> u8 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// Resolve the ordered, non-overlapping free intervals for a date.
///
/// The working window for the weekday minus the union of that date's
/// exception intervals. No rule, `is_available = false`, or an all-day
/// exception all yield an empty day.
pub fn resolve_free_intervals(
    rule: Option<&WorkingHoursRule>,
    exceptions: &[AvailabilityException],
) -> Vec<TimeRange> {
    let window = match rule {
        Some(rule) if rule.is_available => match TimeRange::new(rule.start_time, rule.end_time) {
            Some(window) => window,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    if exceptions.iter().any(AvailabilityException::is_all_day) {
        return Vec::new();
    }

    let blocked = merge_intervals(
        exceptions
            .iter()
            .filter_map(AvailabilityException::time_range)
            .collect(),
    );

    subtract_intervals(window, &blocked)
}

/// Union overlapping or touching intervals into a sorted disjoint list.
pub fn merge_intervals(mut intervals: Vec<TimeRange>) -> Vec<TimeRange> {
    if intervals.is_empty() {
        return intervals;
    }
    intervals.sort_by_key(|r| r.start);

    let mut merged: Vec<TimeRange> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Set-difference of one window against a sorted disjoint blocked list.
pub fn subtract_intervals(window: TimeRange, blocked: &[TimeRange]) -> Vec<TimeRange> {
    let mut free = Vec::new();
    let mut cursor = window.start;

    for block in blocked {
        if block.end <= cursor || block.start >= window.end {
            continue;
        }
        if block.start > cursor {
            if let Some(range) = TimeRange::new(cursor, block.start.min(window.end)) {
                free.push(range);
            }
        }
        cursor = cursor.max(block.end);
        if cursor >= window.end {
            return free;
        }
    }

    if let Some(range) = TimeRange::new(cursor, window.end) {
        free.push(range);
    }
    free
}
