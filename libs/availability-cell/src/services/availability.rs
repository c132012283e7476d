use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use tracing::debug;
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_models::{BookingError, BookingPolicy, EventKind, TimeRange};
use shared_store::CalendarStore;
use shared_utils::Clock;

use crate::models::{AvailabilityTarget, AvailableSlot};
use crate::services::hours::{self, merge_intervals};

/// Computes bookable slots from working hours, existing events, and the
/// clinic's booking policy. Read-only: a slot returned here is a candidate,
/// never a reservation — the conflict resolver re-validates at write time.
pub struct AvailabilityEngine {
    store: Arc<dyn CalendarStore>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
}

impl AvailabilityEngine {
    pub fn new(store: Arc<dyn CalendarStore>, clock: Arc<dyn Clock>, config: SchedulingConfig) -> Self {
        Self { store, clock, config }
    }

    /// Bookable slots for one practitioner, date, and appointment type.
    pub async fn get_availability(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        appointment_type_id: Uuid,
    ) -> Result<Vec<AvailableSlot>, BookingError> {
        debug!(%practitioner_id, %date, "computing availability");

        let appointment_type = self
            .store
            .load_appointment_type(appointment_type_id)
            .await?
            .ok_or(BookingError::NotFound(appointment_type_id))?;
        let practitioner = self
            .store
            .load_practitioner(practitioner_id)
            .await?
            .ok_or(BookingError::NotFound(practitioner_id))?;
        let policy = self.store.load_policy(practitioner.clinic_id).await?;

        let weekday = hours::day_of_week(date);
        let rules = self.store.load_working_hours(practitioner_id).await?;
        let rule = rules.iter().find(|r| r.day_of_week == weekday);
        let exceptions = self.store.load_exceptions(practitioner_id, date).await?;
        let free = hours::resolve_free_intervals(rule, &exceptions);
        if free.is_empty() {
            return Ok(Vec::new());
        }

        let events = self
            .store
            .load_events_for_practitioner_on_date(practitioner_id, date)
            .await?;
        let booked = merge_intervals(
            events
                .iter()
                .filter(|e| e.kind == EventKind::Appointment)
                .filter_map(|e| e.time_range())
                .collect(),
        );

        // Busy list for the compact-schedule adjacency hint: every timed
        // event, bookings and blocks alike, merged.
        let busy_for_adjacency =
            merge_intervals(events.iter().filter_map(|e| e.time_range()).collect());

        let mut slots = Vec::new();
        let duration = appointment_type.duration_minutes;
        let granularity = self.config.slot_granularity_minutes;

        for interval in &free {
            let mut offset = minutes_of(interval.start);
            let end = minutes_of(interval.end);
            while offset + duration <= end {
                let candidate = TimeRange {
                    start: time_from_minutes(offset),
                    end: time_from_minutes(offset + duration),
                };
                let clashes = booked.iter().any(|b| b.overlaps(&candidate));
                if !clashes && self.passes_policy(&policy, date, candidate.start) {
                    slots.push(AvailableSlot {
                        practitioner_id,
                        date,
                        start_time: candidate.start,
                        end_time: candidate.end,
                        duration_minutes: duration,
                        is_recommended: false,
                    });
                }
                offset += granularity;
            }
        }

        if practitioner.prefers_compact_schedule {
            for slot in &mut slots {
                let range = TimeRange {
                    start: slot.start_time,
                    end: slot.end_time,
                };
                slot.is_recommended = busy_for_adjacency.iter().any(|b| b.adjacent_to(&range));
            }
        }

        debug!(%practitioner_id, %date, count = slots.len(), "availability computed");
        Ok(slots)
    }

    /// Batch variant for calendar-grid views: one call per
    /// `(practitioner, date)` pair without the N+1 on the caller's side.
    /// Policy is still applied per practitioner.
    pub async fn get_availability_batch(
        &self,
        targets: &[AvailabilityTarget],
        appointment_type_id: Uuid,
    ) -> Result<HashMap<(Uuid, NaiveDate), Vec<AvailableSlot>>, BookingError> {
        let lookups = targets.iter().map(|target| async move {
            let slots = self
                .get_availability(target.practitioner_id, target.date, appointment_type_id)
                .await?;
            Ok::<_, BookingError>(((target.practitioner_id, target.date), slots))
        });

        let resolved = futures::future::try_join_all(lookups).await?;
        Ok(resolved.into_iter().collect())
    }

    /// Lead-time and booking-window checks, computed in clinic-local time
    /// so day boundaries do not drift with the server timezone.
    fn passes_policy(&self, policy: &BookingPolicy, date: NaiveDate, start: NaiveTime) -> bool {
        let now_local = self
            .clock
            .now_clinic_local(self.config.clinic_utc_offset_minutes);
        let slot_start = date.and_time(start);

        if slot_start < now_local + Duration::hours(policy.minimum_booking_hours_ahead) {
            return false;
        }
        if let Some(window_days) = policy.max_booking_window_days {
            if date > now_local.date() + Duration::days(window_days) {
                return false;
            }
        }
        true
    }
}

fn minutes_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) / 60
}

fn time_from_minutes(minutes: i64) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(minutes as u32 * 60, 0)
        .unwrap_or(NaiveTime::MIN)
}
