use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use booking_cell::models::{CreateAppointmentRequest, ReassignPractitionerRequest};
use booking_cell::services::BookingService;
use shared_config::SchedulingConfig;
use shared_models::{BookingError, BookingPolicy, BookingRestrictionType};
use shared_store::{CalendarStore, MemoryStore};
use shared_utils::test_fixtures::*;
use shared_utils::FixedClock;

struct Setup {
    store: Arc<MemoryStore>,
    service: BookingService,
    clinic_id: Uuid,
    appointment_type_id: Uuid,
    monday: NaiveDate,
}

async fn setup() -> Setup {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
    ));
    let clinic_id = Uuid::new_v4();

    let definition = appointment_type("consultation", 30);
    let appointment_type_id = definition.id;
    store.seed_appointment_type(definition).await;

    let service = BookingService::new(
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
        clock as _,
        SchedulingConfig::default(),
    );

    Setup {
        store,
        service,
        clinic_id,
        appointment_type_id,
        monday: date(2026, 3, 2),
    }
}

async fn seed_capable_practitioner(s: &Setup, name: &str) -> Uuid {
    let profile = practitioner(s.clinic_id, name);
    let id = profile.id;
    s.store.seed_practitioner(profile).await;
    s.store
        .seed_capability(capability(id, s.appointment_type_id))
        .await;
    s.store
        .seed_working_hours(working_hours(id, 1, time(9, 0), time(17, 0)))
        .await;
    id
}

fn auto_request(s: &Setup, start_h: u32) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        clinic_id: s.clinic_id,
        patient_id: Uuid::new_v4(),
        practitioner_id: None,
        appointment_type_id: s.appointment_type_id,
        date: s.monday,
        start_time: time(start_h, 0),
        external_sync_id: None,
    }
}

#[tokio::test]
async fn auto_assignment_picks_the_least_loaded_practitioner() {
    let s = setup().await;
    let busy = seed_capable_practitioner(&s, "Dr. Busy").await;
    let idle = seed_capable_practitioner(&s, "Dr. Idle").await;

    for start in [(9, 0), (10, 0)] {
        s.store
            .seed_appointment(confirmed_appointment(
                s.clinic_id,
                busy,
                Uuid::new_v4(),
                s.appointment_type_id,
                s.monday,
                time(start.0, start.1),
                time(start.0, start.1 + 30),
            ))
            .await;
    }

    let booked = s
        .service
        .create_appointment(auto_request(&s, 14))
        .await
        .unwrap();
    assert_eq!(booked.practitioner_id, idle);
    assert!(booked.is_auto_assigned);
    assert!(booked.originally_auto_assigned);
}

#[tokio::test]
async fn no_capable_practitioner_is_a_typed_error() {
    let s = setup().await;
    // A practitioner exists but has no capability for the type.
    let profile = practitioner(s.clinic_id, "Dr. Other");
    s.store.seed_practitioner(profile).await;

    let err = s
        .service
        .create_appointment(auto_request(&s, 14))
        .await
        .unwrap_err();
    assert_matches!(err, BookingError::NoEligiblePractitioner);
}

#[tokio::test]
async fn closed_panel_practitioner_only_takes_returning_patients() {
    let s = setup().await;
    let profile = practitioner(s.clinic_id, "Dr. Closed");
    let closed = profile.id;
    s.store.seed_practitioner(profile).await;
    let mut cap = capability(closed, s.appointment_type_id);
    cap.accepts_new_patients = false;
    s.store.seed_capability(cap).await;
    s.store
        .seed_working_hours(working_hours(closed, 1, time(9, 0), time(17, 0)))
        .await;

    let err = s
        .service
        .create_appointment(auto_request(&s, 14))
        .await
        .unwrap_err();
    assert_matches!(err, BookingError::NoEligiblePractitioner);

    let returning_patient = Uuid::new_v4();
    s.store.seed_prior_visit(returning_patient, closed).await;
    let mut request = auto_request(&s, 14);
    request.patient_id = returning_patient;
    let booked = s.service.create_appointment(request).await.unwrap();
    assert_eq!(booked.practitioner_id, closed);
}

#[tokio::test]
async fn existing_patients_only_policy_blocks_unseen_patients() {
    let s = setup().await;
    seed_capable_practitioner(&s, "Dr. Ueda").await;
    s.store
        .seed_policy(BookingPolicy {
            booking_restriction_type: BookingRestrictionType::ExistingPatientsOnly,
            ..BookingPolicy::unrestricted(s.clinic_id)
        })
        .await;

    let err = s
        .service
        .create_appointment(auto_request(&s, 14))
        .await
        .unwrap_err();
    assert_matches!(err, BookingError::NoEligiblePractitioner);
}

#[tokio::test]
async fn assigned_practitioner_only_policy_limits_to_prior_practitioners() {
    let s = setup().await;
    let seen = seed_capable_practitioner(&s, "Dr. Seen").await;
    let _unseen = seed_capable_practitioner(&s, "Dr. Unseen").await;
    s.store
        .seed_policy(BookingPolicy {
            booking_restriction_type: BookingRestrictionType::AssignedPractitionerOnly,
            ..BookingPolicy::unrestricted(s.clinic_id)
        })
        .await;

    let patient_id = Uuid::new_v4();
    s.store.seed_prior_visit(patient_id, seen).await;

    let mut request = auto_request(&s, 14);
    request.patient_id = patient_id;
    let booked = s.service.create_appointment(request).await.unwrap();
    assert_eq!(booked.practitioner_id, seen);
}

#[tokio::test]
async fn manual_reassignment_keeps_the_auto_assignment_origin() {
    let s = setup().await;
    let original = seed_capable_practitioner(&s, "Dr. First").await;
    let replacement = seed_capable_practitioner(&s, "Dr. Second").await;
    let _ = original;

    let booked = s
        .service
        .create_appointment(auto_request(&s, 14))
        .await
        .unwrap();
    assert!(booked.originally_auto_assigned);

    let admin = Uuid::new_v4();
    let reassigned = s
        .service
        .reassign_practitioner(ReassignPractitionerRequest {
            appointment_id: booked.id,
            new_practitioner_id: replacement,
            reassigned_by: admin,
        })
        .await
        .unwrap();

    assert!(!reassigned.is_auto_assigned);
    assert!(reassigned.originally_auto_assigned);
    assert_eq!(reassigned.reassigned_by, Some(admin));
    assert!(reassigned.reassigned_at.is_some());

    let stored = s.store.load_appointment(booked.id).await.unwrap().unwrap();
    assert!(stored.originally_auto_assigned);
}

#[tokio::test]
async fn reassignment_to_a_busy_practitioner_conflicts() {
    let s = setup().await;
    let original = seed_capable_practitioner(&s, "Dr. First").await;
    let busy = seed_capable_practitioner(&s, "Dr. Busy").await;
    let _ = original;

    s.store
        .seed_appointment(confirmed_appointment(
            s.clinic_id,
            busy,
            Uuid::new_v4(),
            s.appointment_type_id,
            s.monday,
            time(14, 0),
            time(14, 30),
        ))
        .await;

    let booked = s
        .service
        .create_appointment(auto_request(&s, 14))
        .await
        .unwrap();
    // The selector avoided the busy practitioner, so this booking is at
    // 14:00 with the other one; moving it onto the busy one must fail.
    let err = s
        .service
        .reassign_practitioner(ReassignPractitionerRequest {
            appointment_id: booked.id,
            new_practitioner_id: busy,
            reassigned_by: Uuid::new_v4(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, BookingError::SlotConflict { .. });
}
