pub mod assignment;
pub mod booking;
pub mod conflict;

pub use assignment::AutoAssignmentSelector;
pub use booking::BookingService;
pub use conflict::ConflictResolver;
