use async_trait::async_trait;
use petwalk_core::collaborators::{ChatRooms, CollabResult, RoomHandle, TextGenerator};
use petwalk_core::models::Booking;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::StoreError;

fn client(timeout: Duration) -> Result<reqwest::Client, StoreError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

#[derive(Serialize)]
struct CreateRoom {
    owner_id: Uuid,
    walker_id: Uuid,
    booking_id: Uuid,
    kind: &'static str,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    kind: &'static str,
    booking: &'a Booking,
}

/// Chat service client used when a booking is confirmed.
pub struct HttpChatRooms {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatRooms {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            client: client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatRooms for HttpChatRooms {
    async fn create_post_booking_room(
        &self,
        owner_id: Uuid,
        walker_id: Uuid,
        booking_id: Uuid,
    ) -> CollabResult<RoomHandle> {
        let room: RoomHandle = self
            .client
            .post(format!("{}/rooms", self.base_url))
            .json(&CreateRoom {
                owner_id,
                walker_id,
                booking_id,
                kind: "POST_BOOKING",
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(booking_id = %booking_id, room = %room.id, "chat room created");
        Ok(room)
    }

    async fn post_booking_summary(&self, room: &RoomHandle, booking: &Booking) -> CollabResult<()> {
        self.client
            .post(format!("{}/rooms/{}/messages", self.base_url, room.id))
            .json(&PostMessage {
                kind: "BOOKING_SUMMARY",
                booking,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

/// Text generation service. Callers fall back to templates on any error.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTextGenerator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            client: client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> CollabResult<String> {
        let response: GenerateResponse = self
            .client
            .post(format!("{}/generate", self.base_url))
            .header("Accept", "application/json")
            .json(&GenerateRequest { prompt })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.text)
    }
}
