use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentTypeDef, AvailabilityException, BookingError, BookingPolicy,
    CalendarEvent, DispatchError, DispatchStatus, PractitionerCapability, PractitionerProfile,
    ResourceAllocation, ResourceType, ScheduledDispatch, WorkingHoursRule,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("optimistic concurrency token mismatch")]
    StaleWrite,

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleWrite => BookingError::StaleWrite,
            other => BookingError::Storage(other.to_string()),
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        DispatchError::Storage(err.to_string())
    }
}

/// Read/write seam to the persisted practitioner timeline.
///
/// The availability engine only reads through this trait; the conflict
/// resolver owns every write to appointment time fields.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn load_events_for_practitioner_on_date(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<CalendarEvent>, StoreError>;

    async fn load_working_hours(
        &self,
        practitioner_id: Uuid,
    ) -> Result<Vec<WorkingHoursRule>, StoreError>;

    async fn load_exceptions(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilityException>, StoreError>;

    async fn load_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn load_appointments_for_practitioner_on_date(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Confirmed appointments for a practitioner with `date` in
    /// `[from, to)`; `to = None` means unbounded.
    async fn count_future_confirmed_for_practitioner(
        &self,
        practitioner_id: Uuid,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<u32, StoreError>;

    async fn count_future_confirmed_for_patient(
        &self,
        patient_id: Uuid,
        from: NaiveDate,
    ) -> Result<u32, StoreError>;

    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError>;

    /// Persist an update only when the stored version still matches
    /// `expected_version`; bumps the version on success.
    async fn update_appointment(
        &self,
        appointment: Appointment,
        expected_version: i64,
    ) -> Result<Appointment, StoreError>;

    async fn load_appointment_type(
        &self,
        id: Uuid,
    ) -> Result<Option<AppointmentTypeDef>, StoreError>;

    async fn load_capabilities_for_type(
        &self,
        appointment_type_id: Uuid,
    ) -> Result<Vec<PractitionerCapability>, StoreError>;

    async fn load_practitioner(
        &self,
        id: Uuid,
    ) -> Result<Option<PractitionerProfile>, StoreError>;

    async fn load_policy(&self, clinic_id: Uuid) -> Result<BookingPolicy, StoreError>;

    async fn load_resource_type(&self, id: Uuid) -> Result<Option<ResourceType>, StoreError>;

    async fn load_resource_allocations(
        &self,
        resource_type_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<ResourceAllocation>, StoreError>;

    async fn insert_resource_allocation(
        &self,
        allocation: ResourceAllocation,
    ) -> Result<(), StoreError>;

    async fn delete_resource_allocations_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<(), StoreError>;

    async fn has_prior_visit(
        &self,
        patient_id: Uuid,
        practitioner_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Whether the patient has visited any practitioner at the clinic.
    async fn has_any_prior_visit(&self, patient_id: Uuid) -> Result<bool, StoreError>;
}

/// Owner of `ScheduledDispatch` status transitions.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    async fn enqueue(&self, dispatch: ScheduledDispatch) -> Result<(), StoreError>;

    async fn load_dispatch(&self, id: Uuid) -> Result<Option<ScheduledDispatch>, StoreError>;

    /// Atomically transition every `pending` row with `trigger_time` in
    /// `[window_start, window_end]` to `processing` and return the leased
    /// rows. Equivalent to a conditional `UPDATE ... WHERE status='pending'`:
    /// a row is returned by exactly one caller.
    async fn lease_due(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledDispatch>, StoreError>;

    /// Re-pend `processing` rows whose lease started before `stale_before`,
    /// or mark them failed once retries are exhausted. Returns the rows
    /// that went back to `pending`.
    async fn reclaim_stale(
        &self,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledDispatch>, StoreError>;

    /// Terminal transition out of `processing`.
    async fn complete(
        &self,
        id: Uuid,
        status: DispatchStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Failed send: bump the retry count and either re-pend or fail.
    async fn release_for_retry(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError>;

    /// Skip every `pending` row carrying this idempotency key, so a
    /// superseded message (e.g. a reminder for a rescheduled slot) is never
    /// delivered. Returns the number of rows retired.
    async fn retire_pending(&self, idempotency_key: &str) -> Result<u32, StoreError>;
}
