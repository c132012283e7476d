use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::CanceledBy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    /// `None` triggers auto-assignment.
    pub practitioner_id: Option<Uuid>,
    pub appointment_type_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub external_sync_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_id: Uuid,
    pub new_date: NaiveDate,
    pub new_start_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub appointment_id: Uuid,
    pub canceled_by: CanceledBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignPractitionerRequest {
    pub appointment_id: Uuid,
    pub new_practitioner_id: Uuid,
    pub reassigned_by: Uuid,
}
