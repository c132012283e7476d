pub mod clock;
pub mod test_fixtures;

pub use clock::{Clock, FixedClock, SystemClock};
