use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::calendar::{CalendarEvent, EventKind, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    CanceledByPatient,
    CanceledByClinic,
    PendingTimeConfirmation,
}

impl AppointmentStatus {
    /// Active appointments block the practitioner's time.
    pub fn blocks_time(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Confirmed | AppointmentStatus::PendingTimeConfirmation
        )
    }

    pub fn is_canceled(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::CanceledByPatient | AppointmentStatus::CanceledByClinic
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::CanceledByPatient => write!(f, "canceled_by_patient"),
            AppointmentStatus::CanceledByClinic => write!(f, "canceled_by_clinic"),
            AppointmentStatus::PendingTimeConfirmation => write!(f, "pending_time_confirmation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanceledBy {
    Patient,
    Clinic,
}

/// Booked appointment, the `kind = appointment` specialization of a
/// calendar event.
///
/// `version` is the optimistic-concurrency token; every persisted update
/// bumps it and a mismatch on write surfaces as a stale-write error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    /// Current assignment state; flips back to false on manual reassignment.
    pub is_auto_assigned: bool,
    /// Write-once: set when the first assignment was automatic, never cleared.
    pub originally_auto_assigned: bool,
    pub reassigned_by: Option<Uuid>,
    pub reassigned_at: Option<DateTime<Utc>>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// Candidate windows offered while the patient confirms a time.
    pub alternative_time_slots: Vec<TimeRange>,
    pub external_sync_id: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// View of this appointment as a generic calendar event.
    pub fn as_calendar_event(&self) -> CalendarEvent {
        CalendarEvent {
            id: self.id,
            practitioner_id: self.practitioner_id,
            date: self.date,
            start_time: Some(self.start_time),
            end_time: Some(self.end_time),
            kind: EventKind::Appointment,
            external_sync_id: self.external_sync_id.clone(),
        }
    }
}
