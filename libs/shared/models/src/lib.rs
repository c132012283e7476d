pub mod appointment;
pub mod calendar;
pub mod dispatch;
pub mod error;
pub mod policy;

// Re-export all models for external use
pub use appointment::*;
pub use calendar::*;
pub use dispatch::*;
pub use error::*;
pub use policy::*;
