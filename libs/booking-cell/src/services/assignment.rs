use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::{BookingError, BookingPolicy, BookingRestrictionType};
use shared_store::CalendarStore;

/// Picks a practitioner when the patient did not choose one.
///
/// Candidates are practitioners qualified for the appointment type that the
/// patient is allowed to see; among them the one with the fewest confirmed
/// future appointments in the target window wins, ties broken by ascending
/// practitioner id so repeated runs are deterministic.
pub struct AutoAssignmentSelector {
    store: Arc<dyn CalendarStore>,
}

impl AutoAssignmentSelector {
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self { store }
    }

    pub async fn select(
        &self,
        appointment_type_id: Uuid,
        patient_id: Uuid,
        policy: &BookingPolicy,
        window_from: NaiveDate,
        window_to: Option<NaiveDate>,
    ) -> Result<Uuid, BookingError> {
        let capabilities = self
            .store
            .load_capabilities_for_type(appointment_type_id)
            .await?;
        debug!(%appointment_type_id, candidates = capabilities.len(), "auto-assignment candidates");

        let mut ranked: Vec<(u32, Uuid)> = Vec::new();
        for capability in capabilities {
            if !self
                .is_visible_to_patient(&capability.practitioner_id, patient_id, policy)
                .await?
            {
                continue;
            }
            let seen_before = self
                .store
                .has_prior_visit(patient_id, capability.practitioner_id)
                .await?;
            if !seen_before && !capability.accepts_new_patients {
                continue;
            }

            let load = self
                .store
                .count_future_confirmed_for_practitioner(
                    capability.practitioner_id,
                    window_from,
                    window_to,
                )
                .await?;
            ranked.push((load, capability.practitioner_id));
        }

        if ranked.is_empty() {
            return Err(BookingError::NoEligiblePractitioner);
        }

        ranked.sort();
        let (load, chosen) = ranked[0];
        info!(practitioner_id = %chosen, future_load = load, "auto-assigned practitioner");
        Ok(chosen)
    }

    async fn is_visible_to_patient(
        &self,
        practitioner_id: &Uuid,
        patient_id: Uuid,
        policy: &BookingPolicy,
    ) -> Result<bool, BookingError> {
        match policy.booking_restriction_type {
            BookingRestrictionType::AnyPatient => Ok(true),
            BookingRestrictionType::ExistingPatientsOnly => {
                Ok(self.store.has_any_prior_visit(patient_id).await?)
            }
            BookingRestrictionType::AssignedPractitionerOnly => Ok(self
                .store
                .has_prior_visit(patient_id, *practitioner_id)
                .await?),
        }
    }
}
