use petwalk_core::access::{require_party, role_of, Role};
use petwalk_core::collaborators::{LiveBroadcast, UserDirectory, WalkerDirectory};
use petwalk_core::models::{
    Application, Booking, BookingMethod, BookingStatus, NoteKind, Transition, WalkPhotos, WalkerProfile,
};
use petwalk_core::repository::{ApplicationRepository, BookingRepository, TrackRepository};
use petwalk_core::rules::WalkRules;
use petwalk_core::{Clock, CoreError, CoreResult};
use petwalk_notify::WalkNotifier;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{ApplicationDecision, ApplyRequest, CreateBookingRequest};
use crate::orchestrator::ConfirmationOrchestrator;

/// Attempts at a versioned write before giving up with `Conflict`.
const MAX_WRITE_ATTEMPTS: usize = 3;

pub struct BookingServiceDeps {
    pub bookings: Arc<dyn BookingRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub tracks: Arc<dyn TrackRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub walkers: Arc<dyn WalkerDirectory>,
    pub notifier: Arc<WalkNotifier>,
    pub confirmations: ConfirmationOrchestrator,
    pub live: Arc<dyn LiveBroadcast>,
    pub clock: Arc<dyn Clock>,
    pub rules: WalkRules,
}

/// Manages the booking lifecycle: creation, matching, status changes and the walk itself.
pub struct BookingService {
    pub(crate) bookings: Arc<dyn BookingRepository>,
    pub(crate) applications: Arc<dyn ApplicationRepository>,
    pub(crate) tracks: Arc<dyn TrackRepository>,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) walkers: Arc<dyn WalkerDirectory>,
    pub(crate) notifier: Arc<WalkNotifier>,
    pub(crate) confirmations: ConfirmationOrchestrator,
    pub(crate) live: Arc<dyn LiveBroadcast>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rules: WalkRules,
}

impl BookingService {
    pub fn new(deps: BookingServiceDeps) -> Self {
        Self {
            bookings: deps.bookings,
            applications: deps.applications,
            tracks: deps.tracks,
            users: deps.users,
            walkers: deps.walkers,
            notifier: deps.notifier,
            confirmations: deps.confirmations,
            live: deps.live,
            clock: deps.clock,
            rules: deps.rules,
        }
    }

    pub(crate) async fn load(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))
    }

    /// Read, change, compare-and-swap. A lost race reloads and re-runs `change`.
    pub(crate) async fn mutate<T, F>(&self, booking_id: Uuid, mut change: F) -> CoreResult<(Booking, T)>
    where
        F: FnMut(&mut Booking) -> CoreResult<T>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut booking = self.load(booking_id).await?;
            let out = change(&mut booking)?;
            if self.bookings.update_booking(&booking).await? {
                booking.version += 1;
                return Ok((booking, out));
            }
            debug!(%booking_id, attempt, "Booking version moved, retrying");
        }
        warn!(%booking_id, "Giving up after repeated version conflicts");
        Err(CoreError::Conflict(format!("booking {} is being modified concurrently", booking_id)))
    }

    fn active_walker(walker: Option<WalkerProfile>, what: &str) -> CoreResult<WalkerProfile> {
        let walker = walker.ok_or_else(|| CoreError::NotFound(what.to_string()))?;
        if !walker.is_active() {
            return Err(CoreError::InvalidInput(format!("walker {} is not active", walker.id)));
        }
        Ok(walker)
    }

    async fn walker_profile_of(&self, user_id: Uuid) -> CoreResult<WalkerProfile> {
        self.walkers
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("walker profile for user {}", user_id)))
    }

    fn new_booking(&self, owner_id: Uuid, request: CreateBookingRequest, method: BookingMethod, price: f64) -> Booking {
        let now = self.clock.now();
        let mut booking = Booking {
            id: Uuid::new_v4(),
            owner_id,
            walker_id: None,
            pet_id: request.pet_id,
            method,
            status: BookingStatus::Pending,
            date: request.date,
            duration_minutes: request.duration_minutes,
            total_price: price,
            pickup: request.pickup,
            dropoff: request.dropoff,
            emergency_contact: request.emergency_contact,
            insurance_covered: request.insurance_covered,
            notes: Vec::new(),
            regular_package: request.regular_package,
            package_frequency: request.package_frequency,
            actual_start: None,
            actual_end: None,
            photos: WalkPhotos::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        if let Some(text) = request.notes.filter(|n| !n.trim().is_empty()) {
            booking.add_note(owner_id, NoteKind::Request, text, now);
        }
        booking
    }

    fn validate_duration(duration_minutes: i32) -> CoreResult<()> {
        if duration_minutes <= 0 {
            return Err(CoreError::InvalidInput("duration must be positive".into()));
        }
        Ok(())
    }

    /// Booking with a walker chosen by the owner.
    pub async fn create_direct(&self, owner_id: Uuid, request: CreateBookingRequest) -> CoreResult<Booking> {
        Self::validate_duration(request.duration_minutes)?;
        let walker_id = request
            .walker_id
            .ok_or_else(|| CoreError::InvalidInput("walker_id is required".into()))?;
        let walker = Self::active_walker(
            self.walkers.get_walker(walker_id).await?,
            &format!("walker {}", walker_id),
        )?;

        let rate = walker.hourly_rate.unwrap_or(self.rules.default_hourly_rate);
        let price = Booking::estimate_price(rate, request.duration_minutes);
        let mut booking = self.new_booking(owner_id, request, BookingMethod::WalkerSelection, price);
        booking.walker_id = Some(walker.id);

        self.bookings.insert_booking(&booking).await?;
        info!(booking_id = %booking.id, walker_id = %walker.id, "Direct booking created");
        Ok(booking)
    }

    /// Open request that walkers can bid on.
    pub async fn create_open(&self, owner_id: Uuid, request: CreateBookingRequest) -> CoreResult<Booking> {
        Self::validate_duration(request.duration_minutes)?;
        let pickup_ok = request
            .pickup
            .as_ref()
            .map(|p| !p.location.trim().is_empty() && !p.address.trim().is_empty())
            .unwrap_or(false);
        if !pickup_ok {
            return Err(CoreError::InvalidInput(
                "open requests need a pickup location and address".into(),
            ));
        }

        let price = Booking::estimate_price(self.rules.default_hourly_rate, request.duration_minutes);
        let booking = self.new_booking(owner_id, request, BookingMethod::OpenRequest, price);
        self.bookings.insert_booking(&booking).await?;
        info!(booking_id = %booking.id, "Open request created");
        Ok(booking)
    }

    pub async fn apply(&self, booking_id: Uuid, walker_user: Uuid, request: ApplyRequest) -> CoreResult<Application> {
        let walker = Self::active_walker(
            self.walkers.find_by_user(walker_user).await?,
            &format!("walker profile for user {}", walker_user),
        )?;
        let booking = self.load(booking_id).await?;
        if !booking.is_open_request() || booking.status != BookingStatus::Pending {
            return Err(CoreError::InvalidState(format!(
                "booking {} is not an open request awaiting walkers",
                booking_id
            )));
        }
        if let Some(price) = request.proposed_price {
            if !price.is_finite() || price < 0.0 {
                return Err(CoreError::InvalidInput("proposed_price must be non-negative".into()));
            }
        }
        if self.applications.has_open_bid(booking.owner_id, walker.id).await? {
            return Err(CoreError::InvalidState(format!(
                "walker {} already has a pending application with this owner",
                walker.id
            )));
        }

        let application = Application::new(
            booking_id,
            walker.id,
            request.proposed_price,
            request.message,
            self.clock.now(),
        )?;
        self.applications.insert_application(&application).await?;
        info!(%booking_id, application_id = %application.id, walker_id = %walker.id, "Walker applied");
        Ok(application)
    }

    pub async fn list_applications(&self, booking_id: Uuid, actor: Uuid) -> CoreResult<Vec<Application>> {
        let booking = self.load(booking_id).await?;
        if booking.owner_id != actor {
            return Err(CoreError::Forbidden(format!(
                "only the owner can see applications for {}",
                booking_id
            )));
        }
        Ok(self.applications.list_for_booking(booking_id).await?)
    }

    pub async fn list_walker_applications(&self, walker_user: Uuid) -> CoreResult<Vec<Application>> {
        let walker = self.walker_profile_of(walker_user).await?;
        Ok(self.applications.list_for_walker(walker.id).await?)
    }

    /// Owner confirms or rejects a bid; the bidding walker may withdraw it.
    pub async fn respond_to_application(
        &self,
        application_id: Uuid,
        actor: Uuid,
        decision: ApplicationDecision,
    ) -> CoreResult<Application> {
        let mut application = self
            .applications
            .get_application(application_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("application {}", application_id)))?;
        let parent = self.load(application.booking_id).await?;

        // 1. Who may decide what
        let is_owner = parent.owner_id == actor;
        let is_applicant = match self.walkers.find_by_user(actor).await? {
            Some(walker) => walker.id == application.walker_id,
            None => false,
        };
        let allowed = match decision {
            ApplicationDecision::Confirm | ApplicationDecision::Reject => is_owner,
            ApplicationDecision::Cancel => is_applicant,
        };
        if !allowed {
            return Err(CoreError::Forbidden(format!(
                "not allowed to {:?} application {}",
                decision, application_id
            )));
        }

        let now = self.clock.now();
        let from = application.status;
        match decision {
            ApplicationDecision::Confirm => return self.accept(application, parent.id).await,
            ApplicationDecision::Reject => application.transition(Transition::Reject, now)?,
            ApplicationDecision::Cancel => application.transition(Transition::Cancel, now)?,
        }
        if !self.applications.update_application(&application, from).await? {
            return Err(CoreError::Conflict(format!(
                "application {} changed while being updated",
                application_id
            )));
        }
        info!(%application_id, status = %application.status, "Application updated");
        Ok(application)
    }

    async fn accept(&self, mut application: Application, booking_id: Uuid) -> CoreResult<Application> {
        let now = self.clock.now();
        if application.status != BookingStatus::WalkerApplied {
            return Err(CoreError::InvalidState(format!(
                "application {} is {}",
                application.id, application.status
            )));
        }

        // 1. Parent takes the walker and the agreed price
        let (booking, _) = self
            .mutate(booking_id, |booking| {
                if !booking.is_open_request() || booking.status != BookingStatus::Pending {
                    return Err(CoreError::InvalidState(format!(
                        "booking {} is no longer open",
                        booking.id
                    )));
                }
                booking.transition(Transition::Confirm, now)?;
                booking.walker_id = Some(application.walker_id);
                if let Some(price) = application.proposed_price {
                    booking.total_price = price;
                }
                Ok(())
            })
            .await?;

        // 2. The winning application. The booking is already confirmed, so
        // from here on failures are logged and the side effects still run.
        match application.transition(Transition::Confirm, now) {
            Ok(()) => match self
                .applications
                .update_application(&application, BookingStatus::WalkerApplied)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        %booking_id,
                        application_id = %application.id,
                        "Application changed before it could be marked confirmed"
                    );
                    if let Ok(Some(stored)) = self.applications.get_application(application.id).await {
                        application = stored;
                    }
                }
                Err(e) => warn!(
                    %booking_id,
                    application_id = %application.id,
                    error = %e,
                    "Could not mark application confirmed"
                ),
            },
            Err(e) => warn!(application_id = %application.id, error = %e, "Application confirm skipped"),
        }

        // 3. Every other pending bid loses
        self.reject_pending_applications(booking_id, Some(application.id)).await;

        info!(%booking_id, application_id = %application.id, "Application accepted");
        self.confirmations.on_confirmed(&booking).await;
        Ok(application)
    }

    async fn reject_pending_applications(&self, booking_id: Uuid, keep: Option<Uuid>) {
        let siblings = match self.applications.list_for_booking(booking_id).await {
            Ok(apps) => apps,
            Err(e) => {
                warn!(%booking_id, error = %e, "Could not load sibling applications");
                return;
            }
        };
        let now = self.clock.now();
        for mut sibling in siblings {
            if Some(sibling.id) == keep || sibling.status != BookingStatus::WalkerApplied {
                continue;
            }
            if let Err(e) = sibling.transition(Transition::Reject, now) {
                warn!(application_id = %sibling.id, error = %e, "Sibling rejection skipped");
                continue;
            }
            match self
                .applications
                .update_application(&sibling, BookingStatus::WalkerApplied)
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!(application_id = %sibling.id, "Sibling already decided"),
                Err(e) => warn!(application_id = %sibling.id, error = %e, "Sibling rejection failed"),
            }
        }
    }

    /// Direct status change: owner cancels, the assigned walker confirms or rejects.
    pub async fn update_status(&self, booking_id: Uuid, actor: Uuid, target: BookingStatus) -> CoreResult<Booking> {
        let current = self.load(booking_id).await?;
        let role = role_of(&current, actor, self.walkers.as_ref()).await?;

        let transition = match target {
            BookingStatus::Cancelled => {
                if role != Role::Owner {
                    return Err(CoreError::Forbidden("only the owner can cancel".into()));
                }
                Transition::Cancel
            }
            BookingStatus::Confirmed | BookingStatus::Rejected => {
                if current.is_open_request() {
                    return Err(CoreError::InvalidInput(
                        "open requests are decided through applications".into(),
                    ));
                }
                if !matches!(role, Role::Walker(_)) {
                    return Err(CoreError::Forbidden("only the assigned walker can respond".into()));
                }
                if target == BookingStatus::Confirmed {
                    Transition::Confirm
                } else {
                    Transition::Reject
                }
            }
            other => {
                return Err(CoreError::InvalidInput(format!(
                    "status {} cannot be set directly",
                    other
                )))
            }
        };

        let now = self.clock.now();
        let (booking, _) = self
            .mutate(booking_id, |booking| booking.transition(transition, now))
            .await?;
        info!(%booking_id, status = %booking.status, "Booking status updated");

        match booking.status {
            BookingStatus::Confirmed => self.confirmations.on_confirmed(&booking).await,
            BookingStatus::Cancelled if booking.is_open_request() => {
                self.reject_pending_applications(booking_id, None).await
            }
            _ => {}
        }
        Ok(booking)
    }

    pub async fn cancel(&self, booking_id: Uuid, actor: Uuid) -> CoreResult<Booking> {
        self.update_status(booking_id, actor, BookingStatus::Cancelled).await
    }

    pub async fn get(&self, booking_id: Uuid, actor: Uuid) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        require_party(&booking, actor, self.walkers.as_ref()).await?;
        Ok(booking)
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> CoreResult<Vec<Booking>> {
        Ok(self.bookings.list_by_owner(owner_id).await?)
    }

    pub async fn list_for_walker(&self, walker_user: Uuid) -> CoreResult<Vec<Booking>> {
        let walker = self.walker_profile_of(walker_user).await?;
        Ok(self.bookings.list_by_walker(walker.id).await?)
    }

    pub async fn list_open_requests(&self) -> CoreResult<Vec<Booking>> {
        Ok(self.bookings.list_open_requests().await?)
    }
}
