use async_trait::async_trait;
use parking_lot::Mutex;
use petwalk_shared::models::LiveEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Booking, UserProfile, WalkerProfile};

pub type CollabError = Box<dyn std::error::Error + Send + Sync>;
pub type CollabResult<T> = Result<T, CollabError>;

/// Resolves owners (and their pets) by id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> CollabResult<Option<UserProfile>>;

    async fn pet_name(&self, pet_id: Uuid) -> CollabResult<Option<String>>;
}

#[async_trait]
pub trait WalkerDirectory: Send + Sync {
    async fn get_walker(&self, id: Uuid) -> CollabResult<Option<WalkerProfile>>;

    /// The walker profile belonging to a user account, if any.
    async fn find_by_user(&self, user_id: Uuid) -> CollabResult<Option<WalkerProfile>>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomHandle {
    pub id: String,
}

#[async_trait]
pub trait ChatRooms: Send + Sync {
    async fn create_post_booking_room(
        &self,
        owner_id: Uuid,
        walker_id: Uuid,
        booking_id: Uuid,
    ) -> CollabResult<RoomHandle>;

    async fn post_booking_summary(&self, room: &RoomHandle, booking: &Booking) -> CollabResult<()>;
}

/// What gets handed to the push transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    pub booking_id: Uuid,
    pub kind: String,
    pub body: String,
}

#[async_trait]
pub trait PushDispatcher: Send + Sync {
    async fn send(&self, contact: &str, message: &PushMessage) -> CollabResult<()>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> CollabResult<String>;
}

/// Fan-out of live walk events to connected viewers.
pub trait LiveBroadcast: Send + Sync {
    fn publish(&self, event: LiveEvent) -> CollabResult<()>;
}

/// Chat double that records rooms and can be switched to fail.
#[derive(Default)]
pub struct MockChatRooms {
    pub fail: bool,
    rooms: Mutex<Vec<Uuid>>,
}

impl MockChatRooms {
    pub fn failing() -> Self {
        Self {
            fail: true,
            rooms: Mutex::new(Vec::new()),
        }
    }

    pub fn rooms_created(&self) -> Vec<Uuid> {
        self.rooms.lock().clone()
    }
}

#[async_trait]
impl ChatRooms for MockChatRooms {
    async fn create_post_booking_room(
        &self,
        _owner_id: Uuid,
        _walker_id: Uuid,
        booking_id: Uuid,
    ) -> CollabResult<RoomHandle> {
        if self.fail {
            return Err("chat service unavailable".into());
        }
        self.rooms.lock().push(booking_id);
        Ok(RoomHandle {
            id: format!("room-{}", booking_id),
        })
    }

    async fn post_booking_summary(&self, _room: &RoomHandle, _booking: &Booking) -> CollabResult<()> {
        if self.fail {
            return Err("chat service unavailable".into());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    pub fail: bool,
    sent: Mutex<Vec<(String, PushMessage)>>,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, PushMessage)> {
        self.sent.lock().clone()
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.sent.lock().iter().filter(|(_, m)| m.kind == kind).count()
    }
}

#[async_trait]
impl PushDispatcher for RecordingDispatcher {
    async fn send(&self, contact: &str, message: &PushMessage) -> CollabResult<()> {
        if self.fail {
            return Err("push transport unavailable".into());
        }
        self.sent.lock().push((contact.to_string(), message.clone()));
        Ok(())
    }
}

/// Returns a canned reply, or an error when built with `None`.
pub struct MockTextGenerator {
    reply: Option<String>,
}

impl MockTextGenerator {
    pub fn new(reply: Option<String>) -> Self {
        Self { reply }
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, _prompt: &str) -> CollabResult<String> {
        self.reply
            .clone()
            .ok_or_else(|| "text generator unavailable".into())
    }
}

#[derive(Default)]
pub struct RecordingBroadcast {
    events: Mutex<Vec<LiveEvent>>,
}

impl RecordingBroadcast {
    pub fn events(&self) -> Vec<LiveEvent> {
        self.events.lock().clone()
    }
}

impl LiveBroadcast for RecordingBroadcast {
    fn publish(&self, event: LiveEvent) -> CollabResult<()> {
        self.events.lock().push(event);
        Ok(())
    }
}
