use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::{
    Appointment, BookingError, ResourceAllocation, ResourceRequirement, TimeRange,
};
use shared_store::CalendarStore;

/// Sole owner of the appointment time-field write path.
///
/// Every check-then-write runs under an advisory lock scoped to the
/// practitioner, so two simultaneous requests for the same open slot
/// serialize and exactly one persists. Locks are per practitioner, never
/// global: unrelated practitioners book in parallel.
pub struct ConflictResolver {
    store: Arc<dyn CalendarStore>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Persist a new appointment after re-validating the slot under the
    /// practitioner's lock. Availability reads are advisory; this is where
    /// the no-overlap guarantee is actually enforced.
    pub async fn book(
        &self,
        appointment: Appointment,
        requirement: Option<ResourceRequirement>,
    ) -> Result<Appointment, BookingError> {
        let lock = self.practitioner_lock(appointment.practitioner_id).await;
        let _guard = lock.lock().await;

        let range = appointment.time_range();
        self.ensure_slot_free(appointment.practitioner_id, appointment.date, range, None)
            .await?;
        if let Some(requirement) = requirement {
            self.ensure_resource_capacity(requirement, appointment.date, range, None)
                .await?;
        }

        self.store.insert_appointment(appointment.clone()).await?;
        if let Some(requirement) = requirement {
            self.store
                .insert_resource_allocation(ResourceAllocation {
                    id: Uuid::new_v4(),
                    resource_type_id: requirement.resource_type_id,
                    appointment_id: appointment.id,
                    date: appointment.date,
                    start_time: appointment.start_time,
                    end_time: appointment.end_time,
                    units: requirement.units,
                })
                .await?;
        }

        debug!(appointment_id = %appointment.id, practitioner_id = %appointment.practitioner_id,
               "appointment booked");
        Ok(appointment)
    }

    /// Move an appointment to a new window. The scan excludes the
    /// appointment's own prior interval (it cannot conflict with itself)
    /// but covers everything else booked meanwhile; the optimistic version
    /// token turns a concurrent mutation into `StaleWrite`.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_date: NaiveDate,
        new_range: TimeRange,
        requirement: Option<ResourceRequirement>,
    ) -> Result<Appointment, BookingError> {
        let current = self
            .store
            .load_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound(appointment_id))?;

        let lock = self.practitioner_lock(current.practitioner_id).await;
        let _guard = lock.lock().await;

        self.ensure_slot_free(
            current.practitioner_id,
            new_date,
            new_range,
            Some(appointment_id),
        )
        .await?;
        if let Some(requirement) = requirement {
            self.ensure_resource_capacity(requirement, new_date, new_range, Some(appointment_id))
                .await?;
        }

        let mut updated = current.clone();
        updated.date = new_date;
        updated.start_time = new_range.start;
        updated.end_time = new_range.end;
        let updated = self
            .store
            .update_appointment(updated, current.version)
            .await?;

        if let Some(requirement) = requirement {
            self.store
                .delete_resource_allocations_for_appointment(appointment_id)
                .await?;
            self.store
                .insert_resource_allocation(ResourceAllocation {
                    id: Uuid::new_v4(),
                    resource_type_id: requirement.resource_type_id,
                    appointment_id,
                    date: new_date,
                    start_time: new_range.start,
                    end_time: new_range.end,
                    units: requirement.units,
                })
                .await?;
        }

        debug!(%appointment_id, "appointment rescheduled");
        Ok(updated)
    }

    /// Hand an appointment to a different practitioner, keeping its window.
    pub async fn reassign(
        &self,
        appointment_id: Uuid,
        new_practitioner_id: Uuid,
        reassigned_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookingError> {
        let current = self
            .store
            .load_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound(appointment_id))?;

        let lock = self.practitioner_lock(new_practitioner_id).await;
        let _guard = lock.lock().await;

        self.ensure_slot_free(new_practitioner_id, current.date, current.time_range(), None)
            .await?;

        let mut updated = current.clone();
        updated.practitioner_id = new_practitioner_id;
        updated.is_auto_assigned = false;
        updated.reassigned_by = Some(reassigned_by);
        updated.reassigned_at = Some(now);
        // originally_auto_assigned is write-once and stays as-is.
        let updated = self
            .store
            .update_appointment(updated, current.version)
            .await?;

        debug!(%appointment_id, %new_practitioner_id, "appointment reassigned");
        Ok(updated)
    }

    async fn practitioner_lock(&self, practitioner_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(practitioner_id).or_default())
    }

    /// Half-open overlap scan against the practitioner's active
    /// appointments; back-to-back boundaries are not conflicts.
    async fn ensure_slot_free(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        range: TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), BookingError> {
        let existing = self
            .store
            .load_appointments_for_practitioner_on_date(practitioner_id, date)
            .await?;

        let conflicting: Vec<Uuid> = existing
            .iter()
            .filter(|a| {
                Some(a.id) != exclude_appointment_id
                    && a.status.blocks_time()
                    && a.time_range().overlaps(&range)
            })
            .map(|a| a.id)
            .collect();

        if conflicting.is_empty() {
            Ok(())
        } else {
            warn!(%practitioner_id, %date, %range, count = conflicting.len(),
                  "slot conflict detected");
            Err(BookingError::SlotConflict {
                conflicting_event_ids: conflicting,
            })
        }
    }

    /// Reject when fewer than the required units of the resource type are
    /// free anywhere in the window.
    async fn ensure_resource_capacity(
        &self,
        requirement: ResourceRequirement,
        date: NaiveDate,
        range: TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), BookingError> {
        let resource_type = self
            .store
            .load_resource_type(requirement.resource_type_id)
            .await?
            .ok_or(BookingError::NotFound(requirement.resource_type_id))?;

        let allocations = self
            .store
            .load_resource_allocations(requirement.resource_type_id, date)
            .await?;
        let overlapping: Vec<&ResourceAllocation> = allocations
            .iter()
            .filter(|a| {
                Some(a.appointment_id) != exclude_appointment_id
                    && a.time_range().is_some_and(|r| r.overlaps(&range))
            })
            .collect();
        let units_in_use: u32 = overlapping.iter().map(|a| a.units).sum();

        if units_in_use + requirement.units > resource_type.total_units {
            warn!(resource_type_id = %requirement.resource_type_id, %date, %range,
                  units_in_use, requested = requirement.units, total = resource_type.total_units,
                  "insufficient resource units");
            return Err(BookingError::SlotConflict {
                conflicting_event_ids: overlapping.iter().map(|a| a.appointment_id).collect(),
            });
        }
        Ok(())
    }
}
