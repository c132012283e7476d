use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use availability_cell::models::AvailabilityTarget;
use availability_cell::services::AvailabilityEngine;
use shared_config::SchedulingConfig;
use shared_models::{AppointmentStatus, BookingPolicy};
use shared_store::MemoryStore;
use shared_utils::test_fixtures::*;
use shared_utils::FixedClock;

// 2026-03-02 is a Monday.
const MONDAY: (i32, u32, u32) = (2026, 3, 2);

struct Setup {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    engine: AvailabilityEngine,
    clinic_id: Uuid,
    practitioner_id: Uuid,
    appointment_type_id: Uuid,
    monday: NaiveDate,
}

async fn setup(duration_minutes: i64) -> Setup {
    let store = Arc::new(MemoryStore::new());
    // Sunday noon UTC, the day before the queried Monday.
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let clinic_id = Uuid::new_v4();

    let profile = practitioner(clinic_id, "Dr. Ueda");
    let practitioner_id = profile.id;
    store.seed_practitioner(profile).await;

    let definition = appointment_type("consultation", duration_minutes);
    let appointment_type_id = definition.id;
    store.seed_appointment_type(definition).await;

    let monday = date(MONDAY.0, MONDAY.1, MONDAY.2);
    store
        .seed_working_hours(working_hours(practitioner_id, 1, time(9, 0), time(12, 0)))
        .await;

    let engine = AvailabilityEngine::new(
        Arc::clone(&store) as _,
        Arc::clone(&clock) as _,
        SchedulingConfig::default(),
    );

    Setup {
        store,
        clock,
        engine,
        clinic_id,
        practitioner_id,
        appointment_type_id,
        monday,
    }
}

#[tokio::test]
async fn slots_step_at_granularity_through_the_working_window() {
    let s = setup(30).await;
    let slots = s
        .engine
        .get_availability(s.practitioner_id, s.monday, s.appointment_type_id)
        .await
        .unwrap();

    // 09:00 through 11:30 inclusive at 15-minute steps.
    assert_eq!(slots.len(), 11);
    assert_eq!(slots[0].start_time, time(9, 0));
    assert_eq!(slots[0].end_time, time(9, 30));
    assert_eq!(slots.last().unwrap().start_time, time(11, 30));
    assert!(slots.iter().all(|s| s.duration_minutes == 30));
}

#[tokio::test]
async fn confirmed_appointment_blocks_overlapping_slots_only() {
    let s = setup(30).await;
    s.store
        .seed_appointment(confirmed_appointment(
            s.clinic_id,
            s.practitioner_id,
            Uuid::new_v4(),
            s.appointment_type_id,
            s.monday,
            time(10, 0),
            time(10, 30),
        ))
        .await;

    let slots = s
        .engine
        .get_availability(s.practitioner_id, s.monday, s.appointment_type_id)
        .await
        .unwrap();
    let starts: Vec<_> = slots.iter().map(|s| s.start_time).collect();

    // Anything overlapping [10:00, 10:30) is gone; the touching 09:30 and
    // 10:30 starts survive.
    assert!(starts.contains(&time(9, 30)));
    assert!(starts.contains(&time(10, 30)));
    assert!(!starts.contains(&time(9, 45)));
    assert!(!starts.contains(&time(10, 0)));
    assert!(!starts.contains(&time(10, 15)));
}

#[tokio::test]
async fn canceled_appointment_does_not_block() {
    let s = setup(30).await;
    let mut appointment = confirmed_appointment(
        s.clinic_id,
        s.practitioner_id,
        Uuid::new_v4(),
        s.appointment_type_id,
        s.monday,
        time(10, 0),
        time(10, 30),
    );
    appointment.status = AppointmentStatus::CanceledByPatient;
    s.store.seed_appointment(appointment).await;

    let slots = s
        .engine
        .get_availability(s.practitioner_id, s.monday, s.appointment_type_id)
        .await
        .unwrap();
    assert!(slots.iter().any(|slot| slot.start_time == time(10, 0)));
}

#[tokio::test]
async fn all_day_exception_empties_the_day() {
    let s = setup(30).await;
    s.store
        .seed_exception(exception(s.practitioner_id, s.monday, None, None))
        .await;

    let slots = s
        .engine
        .get_availability(s.practitioner_id, s.monday, s.appointment_type_id)
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn timed_exception_carves_out_its_window() {
    let s = setup(30).await;
    s.store
        .seed_exception(exception(
            s.practitioner_id,
            s.monday,
            Some(time(9, 0)),
            Some(time(10, 0)),
        ))
        .await;

    let slots = s
        .engine
        .get_availability(s.practitioner_id, s.monday, s.appointment_type_id)
        .await
        .unwrap();
    assert_eq!(slots[0].start_time, time(10, 0));
}

#[tokio::test]
async fn lead_time_policy_filters_near_slots_in_clinic_local_time() {
    let s = setup(30).await;
    s.store
        .seed_policy(BookingPolicy {
            minimum_booking_hours_ahead: 24,
            ..BookingPolicy::unrestricted(s.clinic_id)
        })
        .await;
    // Monday 08:00: with a 24h lead time nothing on Monday is bookable.
    s.clock
        .set(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());

    let slots = s
        .engine
        .get_availability(s.practitioner_id, s.monday, s.appointment_type_id)
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn booking_window_policy_excludes_far_dates() {
    let s = setup(30).await;
    s.store
        .seed_policy(BookingPolicy {
            max_booking_window_days: Some(7),
            ..BookingPolicy::unrestricted(s.clinic_id)
        })
        .await;
    s.store
        .seed_working_hours(working_hours(s.practitioner_id, 1, time(9, 0), time(12, 0)))
        .await;

    // Monday three weeks out, same weekday rule applies.
    let far_monday = date(2026, 3, 23);
    let slots = s
        .engine
        .get_availability(s.practitioner_id, far_monday, s.appointment_type_id)
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn batch_lookup_matches_individual_calls() {
    let s = setup(30).await;
    let tuesday = date(2026, 3, 3);
    s.store
        .seed_working_hours(working_hours(s.practitioner_id, 2, time(13, 0), time(15, 0)))
        .await;

    let targets = vec![
        AvailabilityTarget {
            practitioner_id: s.practitioner_id,
            date: s.monday,
        },
        AvailabilityTarget {
            practitioner_id: s.practitioner_id,
            date: tuesday,
        },
    ];
    let batch = s
        .engine
        .get_availability_batch(&targets, s.appointment_type_id)
        .await
        .unwrap();

    for target in &targets {
        let single = s
            .engine
            .get_availability(target.practitioner_id, target.date, s.appointment_type_id)
            .await
            .unwrap();
        assert_eq!(batch[&(target.practitioner_id, target.date)], single);
    }
}

#[tokio::test]
async fn compact_schedule_recommends_slots_touching_existing_bookings() {
    let s = setup(30).await;
    let mut profile = practitioner(s.clinic_id, "Dr. Sato");
    profile.prefers_compact_schedule = true;
    let compact_id = profile.id;
    s.store.seed_practitioner(profile).await;
    s.store
        .seed_working_hours(working_hours(compact_id, 1, time(9, 0), time(12, 0)))
        .await;
    s.store
        .seed_appointment(confirmed_appointment(
            s.clinic_id,
            compact_id,
            Uuid::new_v4(),
            s.appointment_type_id,
            s.monday,
            time(10, 0),
            time(10, 30),
        ))
        .await;

    let slots = s
        .engine
        .get_availability(compact_id, s.monday, s.appointment_type_id)
        .await
        .unwrap();

    let recommended: Vec<_> = slots
        .iter()
        .filter(|s| s.is_recommended)
        .map(|s| s.start_time)
        .collect();
    assert_eq!(recommended, vec![time(9, 30), time(10, 30)]);
}

#[tokio::test]
async fn no_rule_for_weekday_yields_no_slots() {
    let s = setup(30).await;
    let saturday = date(2026, 3, 7);
    let slots = s
        .engine
        .get_availability(s.practitioner_id, saturday, s.appointment_type_id)
        .await
        .unwrap();
    assert!(slots.is_empty());
}
