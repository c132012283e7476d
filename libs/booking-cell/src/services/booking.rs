use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use availability_cell::services::hours;
use shared_config::SchedulingConfig;
use shared_models::{
    Appointment, AppointmentStatus, BookingError, BookingPolicy, CanceledBy, DispatchContext,
    PolicyViolation, ScheduledDispatch, TimeRange,
};
use shared_store::{CalendarStore, DispatchStore};
use shared_utils::Clock;

use crate::models::{
    CancelAppointmentRequest, CreateAppointmentRequest, ReassignPractitionerRequest,
    RescheduleAppointmentRequest,
};
use crate::services::assignment::AutoAssignmentSelector;
use crate::services::conflict::ConflictResolver;

/// Facade over the booking write path: policy validation, practitioner
/// resolution, the atomic conflict-checked persist, and reminder enqueue.
pub struct BookingService {
    store: Arc<dyn CalendarStore>,
    dispatch: Arc<dyn DispatchStore>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
    conflict_resolver: ConflictResolver,
    selector: AutoAssignmentSelector,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn CalendarStore>,
        dispatch: Arc<dyn DispatchStore>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
    ) -> Self {
        let conflict_resolver = ConflictResolver::new(Arc::clone(&store));
        let selector = AutoAssignmentSelector::new(Arc::clone(&store));
        Self {
            store,
            dispatch,
            clock,
            config,
            conflict_resolver,
            selector,
        }
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        info!(patient_id = %request.patient_id, practitioner_id = ?request.practitioner_id,
              date = %request.date, "creating appointment");

        let appointment_type = self
            .store
            .load_appointment_type(request.appointment_type_id)
            .await?
            .ok_or(BookingError::NotFound(request.appointment_type_id))?;
        let range = slot_range(request.start_time, appointment_type.duration_minutes)?;

        let policy = self.store.load_policy(request.clinic_id).await?;
        self.validate_policy(&policy, request.date, request.start_time)?;
        self.validate_patient_cap(&policy, request.patient_id).await?;

        let (practitioner_id, auto_assigned) = match request.practitioner_id {
            Some(id) => {
                self.store
                    .load_practitioner(id)
                    .await?
                    .ok_or(BookingError::NotFound(id))?;
                (id, false)
            }
            None => {
                let chosen = self
                    .selector
                    .select(
                        request.appointment_type_id,
                        request.patient_id,
                        &policy,
                        self.today_local(),
                        None,
                    )
                    .await?;
                (chosen, true)
            }
        };

        self.ensure_within_working_hours(practitioner_id, request.date, range)
            .await?;

        let now = self.clock.now_utc();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            clinic_id: request.clinic_id,
            practitioner_id,
            patient_id: request.patient_id,
            appointment_type_id: request.appointment_type_id,
            date: request.date,
            start_time: range.start,
            end_time: range.end,
            status: AppointmentStatus::Confirmed,
            is_auto_assigned: auto_assigned,
            originally_auto_assigned: auto_assigned,
            reassigned_by: None,
            reassigned_at: None,
            reminder_sent_at: None,
            alternative_time_slots: Vec::new(),
            external_sync_id: request.external_sync_id,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let booked = self
            .conflict_resolver
            .book(appointment, appointment_type.resource_requirement)
            .await?;
        self.enqueue_reminder(&booked).await?;

        info!(appointment_id = %booked.id, %practitioner_id, "appointment created");
        Ok(booked)
    }

    pub async fn reschedule_appointment(
        &self,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        info!(appointment_id = %request.appointment_id, new_date = %request.new_date,
              "rescheduling appointment");

        let current = self
            .store
            .load_appointment(request.appointment_id)
            .await?
            .ok_or(BookingError::NotFound(request.appointment_id))?;
        let appointment_type = self
            .store
            .load_appointment_type(current.appointment_type_id)
            .await?
            .ok_or(BookingError::NotFound(current.appointment_type_id))?;
        let range = slot_range(request.new_start_time, appointment_type.duration_minutes)?;

        self.ensure_within_working_hours(current.practitioner_id, request.new_date, range)
            .await?;

        let updated = self
            .conflict_resolver
            .reschedule(
                request.appointment_id,
                request.new_date,
                range,
                appointment_type.resource_requirement,
            )
            .await?;
        self.enqueue_reminder(&updated).await?;

        Ok(updated)
    }

    pub async fn cancel_appointment(
        &self,
        request: CancelAppointmentRequest,
    ) -> Result<(), BookingError> {
        let current = self
            .store
            .load_appointment(request.appointment_id)
            .await?
            .ok_or(BookingError::NotFound(request.appointment_id))?;
        if current.status.is_canceled() {
            debug!(appointment_id = %request.appointment_id, "appointment already canceled");
            return Ok(());
        }

        let mut updated = current.clone();
        updated.status = match request.canceled_by {
            CanceledBy::Patient => AppointmentStatus::CanceledByPatient,
            CanceledBy::Clinic => AppointmentStatus::CanceledByClinic,
        };
        self.store
            .update_appointment(updated, current.version)
            .await?;
        self.store
            .delete_resource_allocations_for_appointment(request.appointment_id)
            .await?;

        info!(appointment_id = %request.appointment_id, canceled_by = ?request.canceled_by,
              "appointment canceled");
        Ok(())
    }

    /// Manual reassignment after an automatic one. Flips the current
    /// assignment state but leaves the write-once origin flag alone.
    pub async fn reassign_practitioner(
        &self,
        request: ReassignPractitionerRequest,
    ) -> Result<Appointment, BookingError> {
        self.conflict_resolver
            .reassign(
                request.appointment_id,
                request.new_practitioner_id,
                request.reassigned_by,
                self.clock.now_utc(),
            )
            .await
    }

    fn validate_policy(
        &self,
        policy: &BookingPolicy,
        date: NaiveDate,
        start: NaiveTime,
    ) -> Result<(), BookingError> {
        let now_local = self
            .clock
            .now_clinic_local(self.config.clinic_utc_offset_minutes);
        let slot_start = date.and_time(start);

        if slot_start < now_local + Duration::hours(policy.minimum_booking_hours_ahead) {
            return Err(PolicyViolation::LeadTimeTooShort.into());
        }
        if let Some(window_days) = policy.max_booking_window_days {
            if date > now_local.date() + Duration::days(window_days) {
                return Err(PolicyViolation::BeyondBookingWindow.into());
            }
        }
        Ok(())
    }

    async fn validate_patient_cap(
        &self,
        policy: &BookingPolicy,
        patient_id: Uuid,
    ) -> Result<(), BookingError> {
        if let Some(cap) = policy.max_future_appointments_per_patient {
            let held = self
                .store
                .count_future_confirmed_for_patient(patient_id, self.today_local())
                .await?;
            if held >= cap {
                return Err(PolicyViolation::TooManyFutureAppointments.into());
            }
        }
        Ok(())
    }

    /// The requested window must sit inside one resolved free interval;
    /// exceptions already carve those down.
    async fn ensure_within_working_hours(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        range: TimeRange,
    ) -> Result<(), BookingError> {
        let rules = self.store.load_working_hours(practitioner_id).await?;
        let rule = rules
            .iter()
            .find(|r| r.day_of_week == hours::day_of_week(date));
        let exceptions = self.store.load_exceptions(practitioner_id, date).await?;
        let free = hours::resolve_free_intervals(rule, &exceptions);

        if free.iter().any(|interval| interval.contains(&range)) {
            Ok(())
        } else {
            Err(PolicyViolation::OutsideWorkingHours.into())
        }
    }

    /// Reminder 24 hours ahead; bookings inside that horizon get a shorter
    /// two-hour reminder, clamped to now. Any pending reminder for the same
    /// appointment is retired first so a reschedule cannot double-remind.
    async fn enqueue_reminder(&self, appointment: &Appointment) -> Result<(), BookingError> {
        let start_utc = self.slot_start_utc(appointment.date, appointment.start_time);
        let now = self.clock.now_utc();
        let mut trigger = start_utc - Duration::hours(24);
        if trigger < now {
            trigger = (start_utc - Duration::hours(2)).max(now);
        }

        let context = DispatchContext::AppointmentReminder {
            appointment_id: appointment.id,
            practitioner_id: appointment.practitioner_id,
        };
        let retired = self
            .dispatch
            .retire_pending(&context.idempotency_key())
            .await
            .map_err(|e| BookingError::Storage(e.to_string()))?;
        if retired > 0 {
            debug!(appointment_id = %appointment.id, retired, "superseded reminders retired");
        }

        let dispatch = ScheduledDispatch::new(
            appointment.patient_id,
            appointment.clinic_id,
            trigger,
            context,
            self.config.dispatch_max_retries,
        );
        debug!(appointment_id = %appointment.id, %trigger, "reminder enqueued");
        self.dispatch
            .enqueue(dispatch)
            .await
            .map_err(|e| BookingError::Storage(e.to_string()))
    }

    fn today_local(&self) -> NaiveDate {
        self.clock
            .now_clinic_local(self.config.clinic_utc_offset_minutes)
            .date()
    }

    fn slot_start_utc(&self, date: NaiveDate, start: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(start);
        Utc.from_utc_datetime(&(local - Duration::minutes(self.config.clinic_utc_offset_minutes)))
    }
}

/// Bookable window from a start time and duration; slots never wrap past
/// midnight.
fn slot_range(start: NaiveTime, duration_minutes: i64) -> Result<TimeRange, BookingError> {
    let start_minutes = i64::from(start.num_seconds_from_midnight()) / 60;
    let end_minutes = start_minutes + duration_minutes;
    let end = NaiveTime::from_num_seconds_from_midnight_opt(end_minutes as u32 * 60, 0);
    match end.and_then(|end| TimeRange::new(start, end)) {
        Some(range) if end_minutes <= 24 * 60 => Ok(range),
        _ => Err(PolicyViolation::OutsideWorkingHours.into()),
    }
}
