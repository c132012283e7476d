use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Candidate bookable window for one practitioner and appointment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
    /// Ranking hint for compact schedules: the slot touches an existing
    /// booking or blocked interval. Never used as a filter.
    pub is_recommended: bool,
}

/// One entry of a batch availability request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AvailabilityTarget {
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
}
