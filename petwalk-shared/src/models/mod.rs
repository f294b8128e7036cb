pub mod events;

pub use events::{LiveEvent, WalkPhase};
