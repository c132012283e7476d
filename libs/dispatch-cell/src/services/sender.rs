use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use shared_models::{DispatchContext, DispatchError, ScheduledDispatch};
use shared_store::CalendarStore;

use crate::models::SendOutcome;

/// Delivery side of a leased dispatch. The windower owns the state
/// machine; implementations only decide deliver-or-skip and perform the
/// actual send.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchSender: Send + Sync {
    async fn send(&self, dispatch: &ScheduledDispatch) -> Result<SendOutcome, DispatchError>;
}

/// Sender that re-checks the appointment before delivering and writes the
/// message to the log. Stands in for an email/SMS gateway.
pub struct LogSender {
    store: Arc<dyn CalendarStore>,
}

impl LogSender {
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self { store }
    }

    /// A reminder queued days ago may point at an appointment that was
    /// canceled meanwhile; those are skipped, not failed.
    async fn appointment_still_active(&self, id: Uuid) -> Result<bool, DispatchError> {
        let appointment = self.store.load_appointment(id).await?;
        Ok(appointment.is_some_and(|a| a.status.blocks_time()))
    }
}

#[async_trait]
impl DispatchSender for LogSender {
    async fn send(&self, dispatch: &ScheduledDispatch) -> Result<SendOutcome, DispatchError> {
        let appointment_id = match dispatch.context {
            DispatchContext::AppointmentReminder { appointment_id, .. } => appointment_id,
            DispatchContext::AppointmentFollowUp { appointment_id } => appointment_id,
            DispatchContext::TimeSlotConfirmation { appointment_id } => appointment_id,
        };
        if !self.appointment_still_active(appointment_id).await? {
            info!(dispatch_id = %dispatch.id, %appointment_id,
                  "appointment no longer active, skipping dispatch");
            return Ok(SendOutcome::Skipped);
        }

        info!(dispatch_id = %dispatch.id, recipient_id = %dispatch.recipient_id,
              key = %dispatch.context.idempotency_key(), "dispatch delivered");
        Ok(SendOutcome::Delivered)
    }
}
