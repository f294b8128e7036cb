pub mod guard;
pub mod stats;
pub mod store;

pub use guard::LocationGuard;
pub use stats::{PathStatistics, RouteLabel};
pub use store::{NewSample, TrackStore, WalkPath};
