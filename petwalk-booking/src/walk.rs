use chrono::Duration;
use petwalk_core::access::{require_party, require_walker, Role};
use petwalk_core::best_effort;
use petwalk_core::models::{Booking, BookingStatus, NoteKind, PhotoPhase, Transition};
use petwalk_core::{CoreError, CoreResult};
use petwalk_notify::WalkMessage;
use petwalk_shared::models::{LiveEvent, WalkPhase};
use petwalk_tracking::PathStatistics;
use tracing::{info, warn};
use uuid::Uuid;

use crate::manager::BookingService;
use crate::models::{CompletedWalk, EmergencyDispatch, EmergencyKind};

fn require_in_progress(booking: &Booking, what: &str) -> CoreResult<()> {
    if booking.status != BookingStatus::InProgress {
        return Err(CoreError::InvalidState(format!(
            "{} needs a walk in progress, booking {} is {}",
            what, booking.id, booking.status
        )));
    }
    Ok(())
}

impl BookingService {
    fn publish_phase(&self, booking_id: Uuid, phase: WalkPhase) {
        let event = LiveEvent::StatusChanged {
            booking_id,
            phase,
            timestamp: self.clock.now(),
        };
        if let Err(e) = self.live.publish(event) {
            warn!(%booking_id, error = %e, "Live status publish failed");
        }
    }

    pub async fn start_walk(&self, booking_id: Uuid, actor: Uuid) -> CoreResult<Booking> {
        let current = self.load(booking_id).await?;
        require_walker(&current, actor, self.walkers.as_ref()).await?;

        let now = self.clock.now();
        let (booking, _) = self
            .mutate(booking_id, |booking| {
                booking.transition(Transition::Start, now)?;
                booking.actual_start = Some(now);
                Ok(())
            })
            .await?;
        info!(%booking_id, "Walk started");

        let pet_name = self.notifier.pet_name(&booking).await;
        best_effort(
            "walk start notification",
            booking_id,
            self.notifier.notify_owner(
                &booking,
                WalkMessage::Started {
                    pet_name,
                    duration_minutes: booking.duration_minutes,
                },
            ),
        )
        .await;
        self.publish_phase(booking_id, WalkPhase::Started);
        Ok(booking)
    }

    pub async fn complete_walk(
        &self,
        booking_id: Uuid,
        actor: Uuid,
        special_notes: Option<String>,
    ) -> CoreResult<CompletedWalk> {
        let current = self.load(booking_id).await?;
        require_walker(&current, actor, self.walkers.as_ref()).await?;

        let now = self.clock.now();
        let memo = special_notes.filter(|n| !n.trim().is_empty());
        let (booking, _) = self
            .mutate(booking_id, |booking| {
                booking.transition(Transition::Complete, now)?;
                booking.actual_end = Some(now);
                if booking.actual_start.is_none() {
                    booking.actual_start = Some(now - Duration::minutes(i64::from(booking.duration_minutes)));
                }
                if let Some(memo) = &memo {
                    booking.add_note(actor, NoteKind::WalkerMemo, memo.clone(), now);
                }
                Ok(())
            })
            .await?;

        // The walk is completed at this point; a missing track only costs the summary.
        let statistics = match self.tracks.list_samples(booking_id).await {
            Ok(samples) => PathStatistics::from_samples(&samples),
            Err(e) => {
                warn!(%booking_id, error = %e, "Track unavailable, completing without statistics");
                PathStatistics::empty()
            }
        };
        info!(
            %booking_id,
            distance_km = statistics.total_distance_km,
            samples = statistics.sample_count,
            "Walk completed"
        );

        // Completed walks keep the walk-time duration even without a track.
        let duration_minutes = match (booking.actual_start, booking.actual_end) {
            (Some(start), Some(end)) => (end - start).num_minutes(),
            _ => statistics.duration_minutes,
        };
        let pet_name = self.notifier.pet_name(&booking).await;
        best_effort(
            "walk completion notification",
            booking_id,
            self.notifier.notify_owner(
                &booking,
                WalkMessage::Completed {
                    pet_name,
                    distance_km: statistics.total_distance_km,
                    duration_minutes,
                    route: statistics.route.describe(),
                },
            ),
        )
        .await;
        best_effort("notification cleanup", booking_id, self.notifier.cleanup(booking_id)).await;
        self.publish_phase(booking_id, WalkPhase::Completed);

        Ok(CompletedWalk { booking, statistics })
    }

    /// Either party asks to end a running walk early. The walk itself keeps
    /// running; the request is logged on the booking and the other side is told.
    pub async fn request_termination(&self, booking_id: Uuid, actor: Uuid, reason: String) -> CoreResult<Booking> {
        if reason.trim().is_empty() {
            return Err(CoreError::InvalidInput("a reason is required".into()));
        }
        let current = self.load(booking_id).await?;
        let role = require_party(&current, actor, self.walkers.as_ref()).await?;
        let requester = match role {
            Role::Owner => "owner",
            _ => "walker",
        };

        let now = self.clock.now();
        let note = format!(
            "[{}] termination request - requester: {}, reason: {}",
            now.format("%Y-%m-%d %H:%M"),
            requester,
            reason.trim()
        );
        let (booking, _) = self
            .mutate(booking_id, |booking| {
                require_in_progress(booking, "termination")?;
                booking.add_note(actor, NoteKind::TerminationRequest, note.clone(), now);
                booking.updated_at = now;
                Ok(())
            })
            .await?;
        info!(%booking_id, requester, "Termination requested");

        let pet_name = self.notifier.pet_name(&booking).await;
        let message = WalkMessage::Termination {
            pet_name,
            requested_by: requester.to_string(),
            reason: reason.trim().to_string(),
        };
        match role {
            Role::Owner => {
                let walker = match booking.walker_id {
                    Some(id) => self.walkers.get_walker(id).await.ok().flatten(),
                    None => None,
                };
                match walker.and_then(|w| w.phone) {
                    Some(phone) => {
                        best_effort(
                            "termination notification",
                            booking_id,
                            self.notifier.notify_contact(&phone, booking_id, message),
                        )
                        .await;
                    }
                    None => warn!(%booking_id, "Walker has no contact, termination not pushed"),
                }
            }
            _ => {
                best_effort(
                    "termination notification",
                    booking_id,
                    self.notifier.notify_owner(&booking, message),
                )
                .await;
            }
        }
        Ok(booking)
    }

    pub async fn attach_photo(
        &self,
        booking_id: Uuid,
        actor: Uuid,
        phase: PhotoPhase,
        url: String,
    ) -> CoreResult<Booking> {
        if url.trim().is_empty() {
            return Err(CoreError::InvalidInput("photo url is required".into()));
        }
        let current = self.load(booking_id).await?;
        require_walker(&current, actor, self.walkers.as_ref()).await?;

        let now = self.clock.now();
        let (booking, _) = self
            .mutate(booking_id, |booking| {
                require_in_progress(booking, "photo upload")?;
                booking.photos.set(phase, url.trim().to_string());
                booking.updated_at = now;
                Ok(())
            })
            .await?;
        info!(%booking_id, ?phase, "Walk photo attached");
        Ok(booking)
    }

    /// Resolves the number to dial. Police and fire calls also alert the owner,
    /// regardless of any notification cooldown.
    pub async fn emergency_call(
        &self,
        booking_id: Uuid,
        actor: Uuid,
        kind: EmergencyKind,
        location: Option<String>,
        description: Option<String>,
    ) -> CoreResult<EmergencyDispatch> {
        let booking = self.load(booking_id).await?;
        require_party(&booking, actor, self.walkers.as_ref()).await?;

        let number = match kind {
            EmergencyKind::Police => "112".to_string(),
            EmergencyKind::Fire => "119".to_string(),
            EmergencyKind::EmergencyContact => self.emergency_contact(&booking).await?,
        };
        warn!(%booking_id, ?kind, "Emergency call requested");

        if matches!(kind, EmergencyKind::Police | EmergencyKind::Fire) {
            let pet_name = self.notifier.pet_name(&booking).await;
            best_effort(
                "emergency notification",
                booking_id,
                self.notifier.notify_owner(
                    &booking,
                    WalkMessage::Emergency {
                        pet_name,
                        service: number.clone(),
                        location,
                        description,
                    },
                ),
            )
            .await;
        }

        Ok(EmergencyDispatch {
            booking_id,
            kind,
            number,
        })
    }

    async fn emergency_contact(&self, booking: &Booking) -> CoreResult<String> {
        if let Some(contact) = booking.emergency_contact.as_ref().filter(|c| !c.trim().is_empty()) {
            return Ok(contact.clone());
        }
        self.users
            .get_user(booking.owner_id)
            .await?
            .and_then(|owner| owner.emergency_contact)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CoreError::InvalidInput("no emergency contact on file".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Harness;
    use petwalk_core::models::{LocationSample, SampleKind};
    use petwalk_core::repository::{keys, CooldownStore, TrackRepository};
    use petwalk_core::rules::WalkRules;
    use petwalk_notify::NotificationScheduler;
    use petwalk_tracking::{LocationGuard, NewSample, TrackStore};

    async fn confirmed(h: &Harness) -> Booking {
        let booking = h.service.create_direct(h.owner.id, h.direct_request()).await.unwrap();
        h.service
            .update_status(booking.id, h.walker.user_id, BookingStatus::Confirmed)
            .await
            .unwrap()
    }

    async fn in_progress(h: &Harness) -> Booking {
        let booking = confirmed(h).await;
        h.service.start_walk(booking.id, h.walker.user_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_start_requires_confirmed_and_walker() {
        let h = Harness::new().await;
        let pending = h.service.create_direct(h.owner.id, h.direct_request()).await.unwrap();
        assert!(matches!(
            h.service.start_walk(pending.id, h.walker.user_id).await,
            Err(CoreError::InvalidState(_))
        ));

        let booking = h
            .service
            .update_status(pending.id, h.walker.user_id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert!(matches!(
            h.service.start_walk(booking.id, h.owner.id).await,
            Err(CoreError::Forbidden(_))
        ));

        let started = h.service.start_walk(booking.id, h.walker.user_id).await.unwrap();
        assert_eq!(started.status, BookingStatus::InProgress);
        assert!(started.actual_start.is_some());
        assert_eq!(h.dispatcher.count_kind("START"), 1);
        assert!(h
            .live
            .events()
            .iter()
            .any(|e| matches!(e, LiveEvent::StatusChanged { phase: WalkPhase::Started, .. })));

        assert!(matches!(
            h.service.start_walk(booking.id, h.walker.user_id).await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_requires_in_progress() {
        let h = Harness::new().await;
        let booking = confirmed(&h).await;
        assert!(matches!(
            h.service.complete_walk(booking.id, h.walker.user_id, None).await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_records_memo_stats_and_clears_cooldowns() {
        let h = Harness::new().await;
        let booking = in_progress(&h).await;
        let t0 = booking.actual_start.unwrap();
        for (i, lat) in [37.500, 37.503, 37.506].iter().enumerate() {
            h.repo
                .append_sample(&LocationSample {
                    id: Uuid::new_v4(),
                    booking_id: booking.id,
                    latitude: *lat,
                    longitude: 127.0,
                    timestamp: t0 + Duration::minutes(10 * i as i64),
                    accuracy: None,
                    speed: Some(4.0),
                    altitude: None,
                    kind: SampleKind::Walking,
                })
                .await
                .unwrap();
        }
        h.cooldowns
            .set_if_newer(&keys::progress(booking.id), t0, Duration::zero(), Duration::hours(24))
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(45));
        let done = h
            .service
            .complete_walk(booking.id, h.walker.user_id, Some("Drank lots of water".into()))
            .await
            .unwrap();

        assert_eq!(done.booking.status, BookingStatus::Completed);
        assert!(done.booking.actual_end.is_some());
        assert_eq!(done.booking.notes.last().unwrap().kind, NoteKind::WalkerMemo);
        assert_eq!(done.statistics.sample_count, 3);
        assert_eq!(done.statistics.duration_minutes, 20);
        assert_eq!(h.dispatcher.count_kind("COMPLETE"), 1);
        assert_eq!(h.cooldowns.get(&keys::progress(booking.id)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_completion_stands_when_track_is_unreadable() {
        let h = Harness::new().await;
        let booking = in_progress(&h).await;
        let t0 = booking.actual_start.unwrap();
        h.cooldowns
            .set_if_newer(&keys::progress(booking.id), t0, Duration::zero(), Duration::hours(24))
            .await
            .unwrap();
        h.faults.fail_track_reads();

        h.clock.advance(Duration::minutes(30));
        let done = h
            .service
            .complete_walk(booking.id, h.walker.user_id, None)
            .await
            .unwrap();

        assert_eq!(done.booking.status, BookingStatus::Completed);
        assert_eq!(done.statistics.sample_count, 0);
        assert_eq!(h.dispatcher.count_kind("COMPLETE"), 1);
        assert_eq!(h.cooldowns.get(&keys::progress(booking.id)).await.unwrap(), None);
        assert!(h
            .live
            .events()
            .iter()
            .any(|e| matches!(e, LiveEvent::StatusChanged { phase: WalkPhase::Completed, .. })));
    }

    #[tokio::test]
    async fn test_parked_walk_raises_one_stationary_alert() {
        let h = Harness::new().await;
        let booking = in_progress(&h).await;
        let rules = WalkRules::default();
        let tracks = TrackStore::new(
            h.repo.clone(),
            h.directory.clone(),
            h.repo.clone(),
            LocationGuard::new(h.repo.clone(), rules.clone()),
            h.live.clone(),
            h.clock.clone(),
        );
        let scheduler = NotificationScheduler::new(
            h.repo.clone(),
            h.repo.clone(),
            h.notifier.clone(),
            h.cooldowns.clone(),
            h.clock.clone(),
            rules,
        );

        // Five points drifting about 2 m apart, one minute each
        for i in 0..5 {
            tracks
                .append(
                    booking.id,
                    h.walker.user_id,
                    NewSample {
                        latitude: Some(37.5 + 0.00002 * i as f64),
                        longitude: Some(127.0),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            h.clock.advance(Duration::minutes(1));
        }

        assert_eq!(scheduler.stationary_sweep().await.unwrap().sent, 1);
        assert_eq!(scheduler.stationary_sweep().await.unwrap().sent, 0);
        assert_eq!(h.dispatcher.count_kind("STATIONARY"), 1);
    }

    #[tokio::test]
    async fn test_termination_is_logged_and_pushed_to_counterpart() {
        let h = Harness::new().await;
        let booking = in_progress(&h).await;

        let updated = h
            .service
            .request_termination(booking.id, h.owner.id, "Rain is getting heavy".into())
            .await
            .unwrap();
        let note = updated.notes.last().unwrap();
        assert_eq!(note.kind, NoteKind::TerminationRequest);
        assert!(note.text.contains("requester: owner"));

        let sent = h.dispatcher.sent();
        let (contact, message) = sent.last().unwrap();
        assert_eq!(message.kind, "TERMINATION");
        assert_eq!(contact, "010-9999-0000");
        assert_eq!(updated.status, BookingStatus::InProgress);
    }

    #[tokio::test]
    async fn test_termination_outside_walk_is_invalid() {
        let h = Harness::new().await;
        let booking = confirmed(&h).await;
        assert!(matches!(
            h.service
                .request_termination(booking.id, h.walker.user_id, "sick".into())
                .await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_photos_only_during_walk() {
        let h = Harness::new().await;
        let booking = confirmed(&h).await;
        assert!(matches!(
            h.service
                .attach_photo(booking.id, h.walker.user_id, PhotoPhase::Start, "https://cdn/p1.jpg".into())
                .await,
            Err(CoreError::InvalidState(_))
        ));

        h.service.start_walk(booking.id, h.walker.user_id).await.unwrap();
        let updated = h
            .service
            .attach_photo(booking.id, h.walker.user_id, PhotoPhase::Middle, "https://cdn/p2.jpg".into())
            .await
            .unwrap();
        assert_eq!(updated.photos.middle.as_deref(), Some("https://cdn/p2.jpg"));
        assert!(updated.photos.start.is_none());
    }

    #[tokio::test]
    async fn test_emergency_numbers() {
        let h = Harness::new().await;
        let booking = in_progress(&h).await;

        let police = h
            .service
            .emergency_call(booking.id, h.walker.user_id, EmergencyKind::Police, Some("Han river".into()), None)
            .await
            .unwrap();
        assert_eq!(police.number, "112");
        assert_eq!(h.dispatcher.count_kind("EMERGENCY"), 1);

        let fire = h
            .service
            .emergency_call(booking.id, h.owner.id, EmergencyKind::Fire, None, None)
            .await
            .unwrap();
        assert_eq!(fire.number, "119");

        let contact = h
            .service
            .emergency_call(booking.id, h.walker.user_id, EmergencyKind::EmergencyContact, None, None)
            .await
            .unwrap();
        assert_eq!(contact.number, "010-5555-0000");
        assert_eq!(h.dispatcher.count_kind("EMERGENCY"), 2);

        assert!(matches!(
            h.service
                .emergency_call(booking.id, Uuid::new_v4(), EmergencyKind::Police, None, None)
                .await,
            Err(CoreError::Forbidden(_))
        ));
    }
}
