use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Pending,
    /// Lease state: one worker is sending, nobody else may touch the row.
    Processing,
    Sent,
    Skipped,
    Failed,
}

impl DispatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchStatus::Sent | DispatchStatus::Skipped | DispatchStatus::Failed
        )
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStatus::Pending => write!(f, "pending"),
            DispatchStatus::Processing => write!(f, "processing"),
            DispatchStatus::Sent => write!(f, "sent"),
            DispatchStatus::Skipped => write!(f, "skipped"),
            DispatchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Typed payload for a scheduled message, keyed by `message_type`.
///
/// Adding a dispatch kind means adding a variant here; matches on the
/// context are then checked at compile time instead of at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum DispatchContext {
    AppointmentReminder {
        appointment_id: Uuid,
        practitioner_id: Uuid,
    },
    AppointmentFollowUp {
        appointment_id: Uuid,
    },
    TimeSlotConfirmation {
        appointment_id: Uuid,
    },
}

impl DispatchContext {
    /// Stable key identifying the business event behind this dispatch, so a
    /// retried run cannot double-fire once `sent` is recorded.
    pub fn idempotency_key(&self) -> String {
        match self {
            DispatchContext::AppointmentReminder { appointment_id, .. } => {
                format!("reminder:{appointment_id}")
            }
            DispatchContext::AppointmentFollowUp { appointment_id } => {
                format!("follow_up:{appointment_id}")
            }
            DispatchContext::TimeSlotConfirmation { appointment_id } => {
                format!("slot_confirmation:{appointment_id}")
            }
        }
    }
}

/// One scheduled message with its delivery state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledDispatch {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub clinic_id: Uuid,
    pub trigger_time: DateTime<Utc>,
    pub status: DispatchStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub context: DispatchContext,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl ScheduledDispatch {
    pub fn new(
        recipient_id: Uuid,
        clinic_id: Uuid,
        trigger_time: DateTime<Utc>,
        context: DispatchContext,
        max_retries: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            clinic_id,
            trigger_time,
            status: DispatchStatus::Pending,
            retry_count: 0,
            max_retries,
            context,
            processing_started_at: None,
            sent_at: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
