use petwalk_core::access::{require_party, role_of};
use petwalk_core::collaborators::WalkerDirectory;
use petwalk_core::models::{Booking, BookingChangeRequest, BookingStatus, ChangeStatus, ProposedChanges};
use petwalk_core::repository::{BookingRepository, ChangeRequestRepository};
use petwalk_core::{Clock, CoreError, CoreResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Two-party negotiation of changes to a confirmed booking.
pub struct ChangeNegotiator {
    bookings: Arc<dyn BookingRepository>,
    changes: Arc<dyn ChangeRequestRepository>,
    walkers: Arc<dyn WalkerDirectory>,
    clock: Arc<dyn Clock>,
}

impl ChangeNegotiator {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        changes: Arc<dyn ChangeRequestRepository>,
        walkers: Arc<dyn WalkerDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            changes,
            walkers,
            clock,
        }
    }

    async fn load_booking(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))
    }

    async fn load_change(&self, change_id: Uuid) -> CoreResult<BookingChangeRequest> {
        self.changes
            .get_change(change_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("change request {}", change_id)))
    }

    pub async fn request(
        &self,
        booking_id: Uuid,
        actor: Uuid,
        changes: ProposedChanges,
        reason: Option<String>,
    ) -> CoreResult<BookingChangeRequest> {
        let booking = self.load_booking(booking_id).await?;
        require_party(&booking, actor, self.walkers.as_ref()).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(CoreError::InvalidState(format!(
                "only confirmed bookings can be changed, {} is {}",
                booking_id, booking.status
            )));
        }
        if changes.is_empty() {
            return Err(CoreError::InvalidInput("no changes proposed".into()));
        }
        if matches!(changes.duration_minutes, Some(d) if d <= 0) {
            return Err(CoreError::InvalidInput("duration must be positive".into()));
        }

        let request = BookingChangeRequest {
            id: Uuid::new_v4(),
            booking_id,
            requested_by: actor,
            changes,
            reason,
            status: ChangeStatus::Pending,
            response: None,
            responded_at: None,
            created_at: self.clock.now(),
        };
        self.changes.insert_change(&request).await?;
        info!(%booking_id, change_id = %request.id, "Change requested");
        Ok(request)
    }

    /// The counterpart approves or rejects. Approval writes the booking and
    /// the request together.
    pub async fn respond(
        &self,
        change_id: Uuid,
        actor: Uuid,
        decision: ChangeStatus,
        response: Option<String>,
    ) -> CoreResult<BookingChangeRequest> {
        if decision == ChangeStatus::Pending {
            return Err(CoreError::InvalidInput("decision must be APPROVED or REJECTED".into()));
        }

        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            let mut request = self.load_change(change_id).await?;
            let mut booking = self.load_booking(request.booking_id).await?;

            let role = role_of(&booking, actor, self.walkers.as_ref()).await?;
            if !role.is_party() || request.requested_by == actor {
                return Err(CoreError::Forbidden(format!(
                    "only the other party can answer change request {}",
                    change_id
                )));
            }
            if request.status != ChangeStatus::Pending {
                return Err(CoreError::InvalidState(format!(
                    "change request {} was already {}",
                    change_id,
                    request.status.as_str()
                )));
            }

            let now = self.clock.now();
            request.status = decision;
            request.response = response.clone();
            request.responded_at = Some(now);

            let changed = if decision == ChangeStatus::Approved {
                if booking.status != BookingStatus::Confirmed {
                    return Err(CoreError::InvalidState(format!(
                        "booking {} is {} and can no longer be changed",
                        booking.id, booking.status
                    )));
                }
                request.changes.apply_to(&mut booking, request.requested_by, now);
                Some(&booking)
            } else {
                None
            };

            if self.changes.resolve(&request, changed).await? {
                info!(%change_id, status = decision.as_str(), "Change request resolved");
                return Ok(request);
            }
            debug!(%change_id, attempt, "Change resolution raced, retrying");
        }
        Err(CoreError::Conflict(format!("change request {} is being modified concurrently", change_id)))
    }

    pub async fn list_for_booking(&self, booking_id: Uuid, actor: Uuid) -> CoreResult<Vec<BookingChangeRequest>> {
        let booking = self.load_booking(booking_id).await?;
        require_party(&booking, actor, self.walkers.as_ref()).await?;
        Ok(self.changes.list_changes_for_booking(booking_id).await?)
    }

    /// Pending requests I sent plus those awaiting my answer, newest first.
    pub async fn pending_for(&self, actor: Uuid) -> CoreResult<Vec<BookingChangeRequest>> {
        let mut all = self.changes.list_pending_by_requester(actor).await?;
        all.extend(
            self.changes
                .list_pending_for_owner(actor)
                .await?
                .into_iter()
                .filter(|c| c.requested_by != actor),
        );
        if let Some(walker) = self.walkers.find_by_user(actor).await? {
            all.extend(
                self.changes
                    .list_pending_for_walker(walker.id)
                    .await?
                    .into_iter()
                    .filter(|c| c.requested_by != actor),
            );
        }

        let mut seen = HashSet::new();
        all.retain(|c| seen.insert(c.id));
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Harness;
    use chrono::Duration;

    async fn confirmed(h: &Harness) -> Booking {
        let booking = h.service.create_direct(h.owner.id, h.direct_request()).await.unwrap();
        h.service
            .update_status(booking.id, h.walker.user_id, BookingStatus::Confirmed)
            .await
            .unwrap()
    }

    fn longer_walk() -> ProposedChanges {
        ProposedChanges {
            duration_minutes: Some(120),
            price: Some(48000.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_request_needs_confirmed_booking_and_changes() {
        let h = Harness::new().await;
        let pending = h.service.create_direct(h.owner.id, h.direct_request()).await.unwrap();
        assert!(matches!(
            h.changes.request(pending.id, h.owner.id, longer_walk(), None).await,
            Err(CoreError::InvalidState(_))
        ));

        let booking = confirmed(&h).await;
        assert!(matches!(
            h.changes
                .request(booking.id, h.owner.id, ProposedChanges::default(), None)
                .await,
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            h.changes
                .request(booking.id, h.second_walker.user_id, longer_walk(), None)
                .await,
            Err(CoreError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_approval_applies_changes_once() {
        let h = Harness::new().await;
        let booking = confirmed(&h).await;
        let request = h
            .changes
            .request(booking.id, h.owner.id, longer_walk(), Some("More time".into()))
            .await
            .unwrap();

        assert!(matches!(
            h.changes
                .respond(request.id, h.owner.id, ChangeStatus::Approved, None)
                .await,
            Err(CoreError::Forbidden(_))
        ));

        let approved = h
            .changes
            .respond(request.id, h.walker.user_id, ChangeStatus::Approved, Some("Sure".into()))
            .await
            .unwrap();
        assert_eq!(approved.status, ChangeStatus::Approved);
        assert!(approved.responded_at.is_some());

        let updated = h.service.get(booking.id, h.owner.id).await.unwrap();
        assert_eq!(updated.duration_minutes, 120);
        assert_eq!(updated.total_price, 48000.0);
        assert_eq!(updated.pickup, booking.pickup);

        assert!(matches!(
            h.changes
                .respond(request.id, h.walker.user_id, ChangeStatus::Rejected, None)
                .await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_rejection_leaves_booking_untouched() {
        let h = Harness::new().await;
        let booking = confirmed(&h).await;
        let request = h
            .changes
            .request(booking.id, h.walker.user_id, longer_walk(), None)
            .await
            .unwrap();
        h.changes
            .respond(request.id, h.owner.id, ChangeStatus::Rejected, Some("Can't".into()))
            .await
            .unwrap();

        let after = h.service.get(booking.id, h.owner.id).await.unwrap();
        assert_eq!(after.duration_minutes, booking.duration_minutes);
        assert_eq!(after.version, booking.version);
    }

    #[tokio::test]
    async fn test_pending_for_both_sides() {
        let h = Harness::new().await;
        let booking = confirmed(&h).await;
        let first = h
            .changes
            .request(booking.id, h.owner.id, longer_walk(), None)
            .await
            .unwrap();
        h.clock.advance(Duration::seconds(1));
        let second = h
            .changes
            .request(
                booking.id,
                h.walker.user_id,
                ProposedChanges {
                    insurance_covered: Some(false),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let owner_view = h.changes.pending_for(h.owner.id).await.unwrap();
        assert_eq!(
            owner_view.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(h.changes.pending_for(h.walker.user_id).await.unwrap().len(), 2);
        assert!(h.changes.pending_for(Uuid::new_v4()).await.unwrap().is_empty());
        assert_eq!(h.changes.list_for_booking(booking.id, h.owner.id).await.unwrap().len(), 2);
    }
}
