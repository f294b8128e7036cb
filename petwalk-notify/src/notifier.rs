use chrono::Duration;
use petwalk_core::collaborators::{PushDispatcher, PushMessage, UserDirectory};
use petwalk_core::models::Booking;
use petwalk_core::repository::{keys, CooldownStore};
use petwalk_core::rules::WalkRules;
use petwalk_core::{Clock, CoreError, CoreResult};
use petwalk_shared::pii::Masked;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::messages::{MessageComposer, WalkMessage};

const DEFAULT_PET_NAME: &str = "your dog";

/// Delivers walk notifications and keeps the per-booking history.
pub struct WalkNotifier {
    users: Arc<dyn UserDirectory>,
    dispatcher: Arc<dyn PushDispatcher>,
    composer: MessageComposer,
    cooldowns: Arc<dyn CooldownStore>,
    clock: Arc<dyn Clock>,
    history_ttl: Duration,
}

impl WalkNotifier {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        dispatcher: Arc<dyn PushDispatcher>,
        composer: MessageComposer,
        cooldowns: Arc<dyn CooldownStore>,
        clock: Arc<dyn Clock>,
        rules: &WalkRules,
    ) -> Self {
        Self {
            users,
            dispatcher,
            composer,
            cooldowns,
            clock,
            history_ttl: Duration::hours(rules.cooldown_ttl_hours),
        }
    }

    pub async fn pet_name(&self, booking: &Booking) -> String {
        match self.users.pet_name(booking.pet_id).await {
            Ok(Some(name)) => name,
            Ok(None) => DEFAULT_PET_NAME.to_string(),
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "Pet lookup failed");
                DEFAULT_PET_NAME.to_string()
            }
        }
    }

    /// Sends `message` to the booking owner's phone or e-mail.
    pub async fn notify_owner(&self, booking: &Booking, message: WalkMessage) -> CoreResult<()> {
        let owner = self
            .users
            .get_user(booking.owner_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("owner {}", booking.owner_id)))?;
        let contact = owner
            .contact()
            .ok_or_else(|| CoreError::InvalidInput(format!("owner {} has no contact", owner.id)))?
            .to_string();
        self.notify_contact(&contact, booking.id, message).await
    }

    pub async fn notify_contact(&self, contact: &str, booking_id: Uuid, message: WalkMessage) -> CoreResult<()> {
        let kind = message.kind();
        let body = self.composer.compose(&message).await;
        let push = PushMessage {
            booking_id,
            kind: kind.as_str().to_string(),
            body,
        };

        self.dispatcher
            .send(contact, &push)
            .await
            .map_err(|e| CoreError::Internal(format!("push dispatch failed: {}", e)))?;
        info!(%booking_id, kind = kind.as_str(), contact = %Masked(contact), "Notification sent");

        let entry = format!("{}@{}", kind.as_str(), self.clock.now().to_rfc3339());
        if let Err(e) = self
            .cooldowns
            .push_history(&keys::history(booking_id), &entry, self.history_ttl)
            .await
        {
            warn!(%booking_id, error = %e, "Failed to record notification history");
        }
        Ok(())
    }

    pub async fn history(&self, booking_id: Uuid) -> CoreResult<Vec<String>> {
        Ok(self.cooldowns.history(&keys::history(booking_id)).await?)
    }

    /// Drops every cooldown and history key of a finished walk.
    pub async fn cleanup(&self, booking_id: Uuid) -> CoreResult<()> {
        for key in [
            keys::progress(booking_id),
            keys::stationary(booking_id),
            keys::history(booking_id),
        ] {
            self.cooldowns.delete(&key).await?;
        }
        info!(%booking_id, "Notification state cleared");
        Ok(())
    }
}
