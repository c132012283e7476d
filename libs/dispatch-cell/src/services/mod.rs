pub mod sender;
pub mod windower;

pub use sender::{DispatchSender, LogSender};
pub use windower::ScheduledDispatchWindower;
