use petwalk_core::best_effort;
use petwalk_core::collaborators::ChatRooms;
use petwalk_core::models::Booking;
use petwalk_notify::{WalkMessage, WalkNotifier};
use std::sync::Arc;
use tracing::info;

/// Follow-up work once a booking reaches CONFIRMED. Nothing here can undo
/// the confirmation; every step logs and moves on.
pub struct ConfirmationOrchestrator {
    chat: Arc<dyn ChatRooms>,
    notifier: Arc<WalkNotifier>,
}

impl ConfirmationOrchestrator {
    pub fn new(chat: Arc<dyn ChatRooms>, notifier: Arc<WalkNotifier>) -> Self {
        Self { chat, notifier }
    }

    pub async fn on_confirmed(&self, booking: &Booking) {
        // 1. Chat room between owner and walker, seeded with the booking summary
        if let Some(walker_id) = booking.walker_id {
            let room = best_effort("chat room creation", booking.id, async {
                let room = self
                    .chat
                    .create_post_booking_room(booking.owner_id, walker_id, booking.id)
                    .await?;
                self.chat.post_booking_summary(&room, booking).await?;
                Ok::<_, Box<dyn std::error::Error + Send + Sync>>(room)
            })
            .await;
            if let Some(room) = room {
                info!(booking_id = %booking.id, room_id = %room.id, "Chat room ready");
            }
        }

        // 2. Push to the owner
        let pet_name = self.notifier.pet_name(booking).await;
        best_effort(
            "confirmation push",
            booking.id,
            self.notifier.notify_owner(
                booking,
                WalkMessage::Confirmed {
                    pet_name,
                    date: booking.date,
                },
            ),
        )
        .await;
    }
}
