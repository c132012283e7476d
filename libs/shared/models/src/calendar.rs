use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Half-open time window `[start, end)` within a single calendar day.
///
/// Back-to-back ranges that touch exactly at a boundary do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    /// Build a range, rejecting empty or inverted windows.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True when the two ranges share exactly one boundary instant.
    pub fn adjacent_to(&self, other: &TimeRange) -> bool {
        self.end == other.start || other.end == self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Appointment,
    Unavailability,
}

/// Persisted timeline entry for a practitioner's day.
///
/// `start_time`/`end_time` both `None` means an all-day entry (full-day
/// unavailability). Events never wrap past midnight; an overnight block is
/// stored as one event per date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub kind: EventKind,
    pub external_sync_id: Option<String>,
}

impl CalendarEvent {
    pub fn is_all_day(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    /// Concrete window for a timed event; `None` for all-day entries.
    pub fn time_range(&self) -> Option<TimeRange> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => TimeRange::new(start, end),
            _ => None,
        }
    }
}

/// Weekly recurring working window for one practitioner.
///
/// One window per weekday; split shifts are not representable here (the
/// resolver output already generalizes, only authoring is limited).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHoursRule {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    /// 0 = Sunday through 6 = Saturday.
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

/// Date-specific override carving time out of the working window.
///
/// Multiple exceptions per day are allowed and may overlap each other; they
/// are unioned before subtraction. Missing times mean the whole day is out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

impl AvailabilityException {
    pub fn is_all_day(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => TimeRange::new(start, end),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PractitionerProfile {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub display_name: String,
    /// Opt-in ranking hint: prefer slots adjacent to existing bookings.
    pub prefers_compact_schedule: bool,
}

/// Maps a practitioner to an appointment type they can take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PractitionerCapability {
    pub practitioner_id: Uuid,
    pub appointment_type_id: Uuid,
    pub accepts_new_patients: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentTypeDef {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i64,
    pub resource_requirement: Option<ResourceRequirement>,
}

/// Units of a shared resource (room, device) an appointment type consumes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceRequirement {
    pub resource_type_id: Uuid,
    pub units: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: Uuid,
    pub name: String,
    pub total_units: u32,
}

/// Units of a resource type held by one appointment for a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub id: Uuid,
    pub resource_type_id: Uuid,
    pub appointment_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub units: u32,
}

impl ResourceAllocation {
    pub fn time_range(&self) -> Option<TimeRange> {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn time_range_rejects_inverted_and_empty_windows() {
        assert!(TimeRange::new(t(10, 0), t(9, 0)).is_none());
        assert!(TimeRange::new(t(10, 0), t(10, 0)).is_none());
        assert!(TimeRange::new(t(9, 0), t(10, 0)).is_some());
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let first = TimeRange::new(t(9, 0), t(10, 0)).unwrap();
        let second = TimeRange::new(t(10, 0), t(11, 0)).unwrap();
        assert!(!first.overlaps(&second));
        assert!(first.adjacent_to(&second));
    }

    #[test]
    fn partial_overlap_is_detected_both_directions() {
        let first = TimeRange::new(t(9, 0), t(10, 0)).unwrap();
        let second = TimeRange::new(t(9, 30), t(10, 30)).unwrap();
        assert!(first.overlaps(&second));
        assert!(second.overlaps(&first));
    }
}
