pub mod availability;
pub mod hours;

pub use availability::AvailabilityEngine;
pub use hours::resolve_free_intervals;
