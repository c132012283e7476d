pub mod models;
pub mod services;

pub use models::{RunStats, SendOutcome};
pub use services::sender::{DispatchSender, LogSender};
pub use services::windower::{ScheduledDispatchWindower, WindowerHandle};
