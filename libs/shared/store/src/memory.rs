use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentTypeDef, AvailabilityException, BookingPolicy, CalendarEvent,
    DispatchStatus, EventKind, PractitionerCapability, PractitionerProfile, ResourceAllocation,
    ResourceType, ScheduledDispatch, WorkingHoursRule,
};

use crate::traits::{CalendarStore, DispatchStore, StoreError};

#[derive(Debug, Default)]
struct State {
    appointments: HashMap<Uuid, Appointment>,
    working_hours: HashMap<Uuid, Vec<WorkingHoursRule>>,
    exceptions: Vec<AvailabilityException>,
    appointment_types: HashMap<Uuid, AppointmentTypeDef>,
    capabilities: Vec<PractitionerCapability>,
    practitioners: HashMap<Uuid, PractitionerProfile>,
    policies: HashMap<Uuid, BookingPolicy>,
    resource_types: HashMap<Uuid, ResourceType>,
    resource_allocations: Vec<ResourceAllocation>,
    dispatches: HashMap<Uuid, ScheduledDispatch>,
    prior_visits: HashSet<(Uuid, Uuid)>,
}

/// In-memory store backing the test suites and the scheduler binary.
///
/// A single `RwLock` over the whole state makes each store call one atomic
/// unit, which is what the dispatch lease and the optimistic appointment
/// update rely on.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers for tests and local wiring.

    pub async fn seed_working_hours(&self, rule: WorkingHoursRule) {
        let mut state = self.state.write().await;
        state
            .working_hours
            .entry(rule.practitioner_id)
            .or_default()
            .push(rule);
    }

    pub async fn seed_exception(&self, exception: AvailabilityException) {
        self.state.write().await.exceptions.push(exception);
    }

    pub async fn seed_appointment_type(&self, definition: AppointmentTypeDef) {
        let mut state = self.state.write().await;
        state.appointment_types.insert(definition.id, definition);
    }

    pub async fn seed_capability(&self, capability: PractitionerCapability) {
        self.state.write().await.capabilities.push(capability);
    }

    pub async fn seed_practitioner(&self, profile: PractitionerProfile) {
        let mut state = self.state.write().await;
        state.practitioners.insert(profile.id, profile);
    }

    pub async fn seed_policy(&self, policy: BookingPolicy) {
        let mut state = self.state.write().await;
        state.policies.insert(policy.clinic_id, policy);
    }

    pub async fn seed_resource_type(&self, resource_type: ResourceType) {
        let mut state = self.state.write().await;
        state.resource_types.insert(resource_type.id, resource_type);
    }

    pub async fn seed_appointment(&self, appointment: Appointment) {
        let mut state = self.state.write().await;
        state.appointments.insert(appointment.id, appointment);
    }

    pub async fn seed_prior_visit(&self, patient_id: Uuid, practitioner_id: Uuid) {
        let mut state = self.state.write().await;
        state.prior_visits.insert((patient_id, practitioner_id));
    }

    /// Snapshot of every dispatch row, for assertions and local inspection.
    pub async fn all_dispatches(&self) -> Vec<ScheduledDispatch> {
        let state = self.state.read().await;
        let mut dispatches: Vec<ScheduledDispatch> = state.dispatches.values().cloned().collect();
        dispatches.sort_by_key(|d| d.trigger_time);
        dispatches
    }
}

#[async_trait]
impl CalendarStore for MemoryStore {
    async fn load_events_for_practitioner_on_date(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<CalendarEvent>, StoreError> {
        let state = self.state.read().await;
        let mut events: Vec<CalendarEvent> = state
            .appointments
            .values()
            .filter(|a| {
                a.practitioner_id == practitioner_id && a.date == date && a.status.blocks_time()
            })
            .map(Appointment::as_calendar_event)
            .collect();
        events.extend(
            state
                .exceptions
                .iter()
                .filter(|e| e.practitioner_id == practitioner_id && e.date == date)
                .map(|e| CalendarEvent {
                    id: e.id,
                    practitioner_id: e.practitioner_id,
                    date: e.date,
                    start_time: e.start_time,
                    end_time: e.end_time,
                    kind: EventKind::Unavailability,
                    external_sync_id: None,
                }),
        );
        events.sort_by_key(|e| e.start_time);
        Ok(events)
    }

    async fn load_working_hours(
        &self,
        practitioner_id: Uuid,
    ) -> Result<Vec<WorkingHoursRule>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .working_hours
            .get(&practitioner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_exceptions(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilityException>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .exceptions
            .iter()
            .filter(|e| e.practitioner_id == practitioner_id && e.date == date)
            .cloned()
            .collect())
    }

    async fn load_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn load_appointments_for_practitioner_on_date(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.practitioner_id == practitioner_id && a.date == date)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.start_time);
        Ok(appointments)
    }

    async fn count_future_confirmed_for_practitioner(
        &self,
        practitioner_id: Uuid,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<u32, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| {
                a.practitioner_id == practitioner_id
                    && a.status.blocks_time()
                    && a.date >= from
                    && to.map_or(true, |end| a.date < end)
            })
            .count() as u32)
    }

    async fn count_future_confirmed_for_patient(
        &self,
        patient_id: Uuid,
        from: NaiveDate,
    ) -> Result<u32, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && a.status.blocks_time() && a.date >= from)
            .count() as u32)
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        debug!(appointment_id = %appointment.id, "inserting appointment");
        state.appointments.insert(appointment.id, appointment);
        Ok(())
    }

    async fn update_appointment(
        &self,
        mut appointment: Appointment,
        expected_version: i64,
    ) -> Result<Appointment, StoreError> {
        let mut state = self.state.write().await;
        let stored = state
            .appointments
            .get(&appointment.id)
            .ok_or(StoreError::NotFound)?;
        if stored.version != expected_version {
            return Err(StoreError::StaleWrite);
        }
        appointment.version = expected_version + 1;
        appointment.updated_at = Utc::now();
        state.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn load_appointment_type(
        &self,
        id: Uuid,
    ) -> Result<Option<AppointmentTypeDef>, StoreError> {
        Ok(self.state.read().await.appointment_types.get(&id).cloned())
    }

    async fn load_capabilities_for_type(
        &self,
        appointment_type_id: Uuid,
    ) -> Result<Vec<PractitionerCapability>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .capabilities
            .iter()
            .filter(|c| c.appointment_type_id == appointment_type_id)
            .cloned()
            .collect())
    }

    async fn load_practitioner(
        &self,
        id: Uuid,
    ) -> Result<Option<PractitionerProfile>, StoreError> {
        Ok(self.state.read().await.practitioners.get(&id).cloned())
    }

    async fn load_policy(&self, clinic_id: Uuid) -> Result<BookingPolicy, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .policies
            .get(&clinic_id)
            .cloned()
            .unwrap_or_else(|| BookingPolicy::unrestricted(clinic_id)))
    }

    async fn load_resource_type(&self, id: Uuid) -> Result<Option<ResourceType>, StoreError> {
        Ok(self.state.read().await.resource_types.get(&id).cloned())
    }

    async fn load_resource_allocations(
        &self,
        resource_type_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<ResourceAllocation>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .resource_allocations
            .iter()
            .filter(|a| a.resource_type_id == resource_type_id && a.date == date)
            .cloned()
            .collect())
    }

    async fn insert_resource_allocation(
        &self,
        allocation: ResourceAllocation,
    ) -> Result<(), StoreError> {
        self.state.write().await.resource_allocations.push(allocation);
        Ok(())
    }

    async fn delete_resource_allocations_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .resource_allocations
            .retain(|a| a.appointment_id != appointment_id);
        Ok(())
    }

    async fn has_prior_visit(
        &self,
        patient_id: Uuid,
        practitioner_id: Uuid,
    ) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.prior_visits.contains(&(patient_id, practitioner_id))
            || state.appointments.values().any(|a| {
                a.patient_id == patient_id
                    && a.practitioner_id == practitioner_id
                    && a.status.blocks_time()
            }))
    }

    async fn has_any_prior_visit(&self, patient_id: Uuid) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.prior_visits.iter().any(|(p, _)| *p == patient_id)
            || state
                .appointments
                .values()
                .any(|a| a.patient_id == patient_id && a.status.blocks_time()))
    }
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn enqueue(&self, dispatch: ScheduledDispatch) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        debug!(dispatch_id = %dispatch.id, trigger = %dispatch.trigger_time, "enqueuing dispatch");
        state.dispatches.insert(dispatch.id, dispatch);
        Ok(())
    }

    async fn load_dispatch(&self, id: Uuid) -> Result<Option<ScheduledDispatch>, StoreError> {
        Ok(self.state.read().await.dispatches.get(&id).cloned())
    }

    async fn lease_due(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledDispatch>, StoreError> {
        let mut state = self.state.write().await;
        let mut leased = Vec::new();
        for dispatch in state.dispatches.values_mut() {
            if dispatch.status == DispatchStatus::Pending
                && dispatch.trigger_time >= window_start
                && dispatch.trigger_time <= window_end
            {
                dispatch.status = DispatchStatus::Processing;
                dispatch.processing_started_at = Some(now);
                leased.push(dispatch.clone());
            }
        }
        leased.sort_by_key(|d| d.trigger_time);
        Ok(leased)
    }

    async fn reclaim_stale(
        &self,
        stale_before: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledDispatch>, StoreError> {
        let mut state = self.state.write().await;
        let mut reclaimed = Vec::new();
        for dispatch in state.dispatches.values_mut() {
            let stuck = dispatch.status == DispatchStatus::Processing
                && dispatch
                    .processing_started_at
                    .map_or(true, |started| started < stale_before);
            if !stuck {
                continue;
            }
            dispatch.processing_started_at = None;
            if dispatch.can_retry() {
                dispatch.retry_count += 1;
                dispatch.status = DispatchStatus::Pending;
                reclaimed.push(dispatch.clone());
            } else {
                dispatch.status = DispatchStatus::Failed;
            }
        }
        Ok(reclaimed)
    }

    async fn complete(
        &self,
        id: Uuid,
        status: DispatchStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let dispatch = state.dispatches.get_mut(&id).ok_or(StoreError::NotFound)?;
        if dispatch.status != DispatchStatus::Processing || !status.is_terminal() {
            return Err(StoreError::Backend(format!(
                "illegal dispatch transition {} -> {}",
                dispatch.status, status
            )));
        }
        dispatch.status = status;
        if status == DispatchStatus::Sent {
            dispatch.sent_at = Some(now);
        }
        Ok(())
    }

    async fn release_for_retry(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let dispatch = state.dispatches.get_mut(&id).ok_or(StoreError::NotFound)?;
        if dispatch.status != DispatchStatus::Processing {
            return Err(StoreError::Backend(format!(
                "cannot release dispatch in status {}",
                dispatch.status
            )));
        }
        dispatch.processing_started_at = None;
        if dispatch.can_retry() {
            dispatch.retry_count += 1;
            dispatch.status = DispatchStatus::Pending;
            // Push the retry past the current window so the next run picks
            // it up instead of this one looping on it.
            dispatch.trigger_time = dispatch.trigger_time.max(now);
        } else {
            dispatch.status = DispatchStatus::Failed;
        }
        Ok(())
    }

    async fn retire_pending(&self, idempotency_key: &str) -> Result<u32, StoreError> {
        let mut state = self.state.write().await;
        let mut retired = 0;
        for dispatch in state.dispatches.values_mut() {
            if dispatch.status == DispatchStatus::Pending
                && dispatch.context.idempotency_key() == idempotency_key
            {
                dispatch.status = DispatchStatus::Skipped;
                retired += 1;
            }
        }
        Ok(retired)
    }
}
