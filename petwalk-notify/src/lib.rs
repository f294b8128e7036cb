pub mod messages;
pub mod notifier;
pub mod scheduler;

pub use messages::{MessageComposer, MessageKind, WalkMessage};
pub use notifier::WalkNotifier;
pub use scheduler::{NotificationScheduler, SchedulerStatus, SweepReport};
