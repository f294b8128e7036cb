pub mod changes;
pub mod manager;
pub mod models;
pub mod orchestrator;
pub mod walk;

#[cfg(test)]
mod testkit;

pub use changes::ChangeNegotiator;
pub use manager::{BookingService, BookingServiceDeps};
pub use models::*;
pub use orchestrator::ConfirmationOrchestrator;
