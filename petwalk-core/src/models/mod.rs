pub mod booking;
pub mod change;
pub mod directory;
pub mod track;

pub use booking::{
    Application, Booking, BookingMethod, BookingStatus, NoteEntry, NoteKind, PhotoPhase, Place,
    Transition, WalkPhotos,
};
pub use change::{BookingChangeRequest, ChangeStatus, ProposedChanges};
pub use directory::{UserProfile, WalkerProfile, WalkerStatus};
pub use track::{LocationSample, SampleKind};
