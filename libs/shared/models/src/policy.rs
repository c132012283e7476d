use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingRestrictionType {
    /// Any patient may book any qualified practitioner.
    AnyPatient,
    /// Only patients with a prior visit at the clinic may self-book.
    ExistingPatientsOnly,
    /// Patients may only book practitioners they have seen before.
    AssignedPractitionerOnly,
}

/// Clinic-wide booking restrictions applied before any conflict check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPolicy {
    pub clinic_id: Uuid,
    /// Slots starting sooner than this many hours from clinic-local "now"
    /// are not bookable.
    pub minimum_booking_hours_ahead: i64,
    /// Slots further out than this many days are not bookable.
    pub max_booking_window_days: Option<i64>,
    pub booking_restriction_type: BookingRestrictionType,
    pub max_future_appointments_per_patient: Option<u32>,
}

impl BookingPolicy {
    /// Permissive defaults for clinics that have not configured a policy.
    pub fn unrestricted(clinic_id: Uuid) -> Self {
        Self {
            clinic_id,
            minimum_booking_hours_ahead: 0,
            max_booking_window_days: None,
            booking_restriction_type: BookingRestrictionType::AnyPatient,
            max_future_appointments_per_patient: None,
        }
    }
}
