//! Builders shared by the cell test suites.

use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentStatus, AppointmentTypeDef, AvailabilityException,
    PractitionerCapability, PractitionerProfile, ResourceRequirement, WorkingHoursRule,
};

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn working_hours(
    practitioner_id: Uuid,
    day_of_week: u8,
    start: NaiveTime,
    end: NaiveTime,
) -> WorkingHoursRule {
    WorkingHoursRule {
        id: Uuid::new_v4(),
        practitioner_id,
        day_of_week,
        start_time: start,
        end_time: end,
        is_available: true,
    }
}

pub fn exception(
    practitioner_id: Uuid,
    on: NaiveDate,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
) -> AvailabilityException {
    AvailabilityException {
        id: Uuid::new_v4(),
        practitioner_id,
        date: on,
        start_time: start,
        end_time: end,
        reason: None,
    }
}

pub fn appointment_type(name: &str, duration_minutes: i64) -> AppointmentTypeDef {
    AppointmentTypeDef {
        id: Uuid::new_v4(),
        name: name.to_string(),
        duration_minutes,
        resource_requirement: None,
    }
}

pub fn resource_backed_type(
    name: &str,
    duration_minutes: i64,
    resource_type_id: Uuid,
    units: u32,
) -> AppointmentTypeDef {
    AppointmentTypeDef {
        id: Uuid::new_v4(),
        name: name.to_string(),
        duration_minutes,
        resource_requirement: Some(ResourceRequirement {
            resource_type_id,
            units,
        }),
    }
}

pub fn practitioner(clinic_id: Uuid, name: &str) -> PractitionerProfile {
    PractitionerProfile {
        id: Uuid::new_v4(),
        clinic_id,
        display_name: name.to_string(),
        prefers_compact_schedule: false,
    }
}

pub fn capability(practitioner_id: Uuid, appointment_type_id: Uuid) -> PractitionerCapability {
    PractitionerCapability {
        practitioner_id,
        appointment_type_id,
        accepts_new_patients: true,
    }
}

pub fn confirmed_appointment(
    clinic_id: Uuid,
    practitioner_id: Uuid,
    patient_id: Uuid,
    appointment_type_id: Uuid,
    on: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        clinic_id,
        practitioner_id,
        patient_id,
        appointment_type_id,
        date: on,
        start_time: start,
        end_time: end,
        status: AppointmentStatus::Confirmed,
        is_auto_assigned: false,
        originally_auto_assigned: false,
        reassigned_by: None,
        reassigned_at: None,
        reminder_sent_at: None,
        alternative_time_slots: Vec::new(),
        external_sync_id: None,
        version: 1,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
