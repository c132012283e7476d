use thiserror::Error;
use uuid::Uuid;

/// Policy breaches are user-correctable and never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("slot starts sooner than the minimum booking lead time")]
    LeadTimeTooShort,

    #[error("slot is beyond the maximum booking window")]
    BeyondBookingWindow,

    #[error("patient already holds the maximum number of future appointments")]
    TooManyFutureAppointments,

    #[error("requested time is outside the practitioner's working hours")]
    OutsideWorkingHours,
}

/// Booking-time failures, modeled as values because they are expected,
/// frequent, and each drives a different remediation path for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("requested slot conflicts with {} existing event(s)", conflicting_event_ids.len())]
    SlotConflict { conflicting_event_ids: Vec<Uuid> },

    #[error("booking policy violation: {0}")]
    PolicyViolation(#[from] PolicyViolation),

    #[error("no qualified practitioner is available for auto-assignment")]
    NoEligiblePractitioner,

    #[error("appointment was modified concurrently, re-fetch and retry")]
    StaleWrite,

    #[error("appointment {0} not found")]
    NotFound(Uuid),

    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatch send failed: {0}")]
    SendFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}
