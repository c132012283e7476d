/// What the sender did with a leased dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The business event behind the message no longer warrants sending,
    /// e.g. the appointment was canceled after the reminder was queued.
    Skipped,
}

/// Counters for one windower pass, logged after each run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub reclaimed: usize,
    pub leased: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}
