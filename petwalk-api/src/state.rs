use async_trait::async_trait;
use petwalk_booking::{BookingService, BookingServiceDeps, ChangeNegotiator, ConfirmationOrchestrator};
use petwalk_core::collaborators::{
    ChatRooms, CollabResult, LiveBroadcast, PushDispatcher, TextGenerator, UserDirectory, WalkerDirectory,
};
use petwalk_core::repository::{
    ApplicationRepository, BookingRepository, ChangeRequestRepository, CooldownStore, TrackRepository,
};
use petwalk_core::rules::WalkRules;
use petwalk_core::Clock;
use petwalk_notify::{MessageComposer, NotificationScheduler, WalkNotifier};
use petwalk_shared::models::LiveEvent;
use petwalk_store::RedisClient;
use petwalk_tracking::{LocationGuard, TrackStore};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Fan-out of live walk events to SSE subscribers.
#[derive(Clone)]
pub struct LiveHub {
    tx: broadcast::Sender<LiveEvent>,
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }
}

impl LiveBroadcast for LiveHub {
    fn publish(&self, event: LiveEvent) -> CollabResult<()> {
        // No subscribers is not an error; the walk goes on without viewers.
        if self.tx.send(event).is_err() {
            trace!("live event dropped, no subscribers");
        }
        Ok(())
    }
}

/// Per-client request budget. Implementations decide the window.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self, client: &str) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

pub struct RedisRateLimiter {
    pub redis: Arc<RedisClient>,
    pub requests: u64,
    pub window_seconds: i64,
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, client: &str) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .redis
            .check_rate_limit(client, self.requests, self.window_seconds)
            .await?)
    }
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub http_requests: IntCounterVec,
    pub notifications: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let http_requests = IntCounterVec::new(
            Opts::new("petwalk_http_requests_total", "HTTP requests by method and status"),
            &["method", "status"],
        )?;
        let notifications = IntCounterVec::new(
            Opts::new("petwalk_sweep_notifications_total", "Scheduled walk notifications by sweep and outcome"),
            &["sweep", "outcome"],
        )?;
        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(notifications.clone()))?;
        Ok(Self {
            registry,
            http_requests,
            notifications,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub changes: Arc<ChangeNegotiator>,
    pub tracks: Arc<TrackStore>,
    pub notifier: Arc<WalkNotifier>,
    pub scheduler: Arc<NotificationScheduler>,
    pub live: LiveHub,
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,
    pub metrics: Metrics,
    pub auth: AuthConfig,
}

/// Storage and collaborator implementations the services are built on.
pub struct Backends {
    pub bookings: Arc<dyn BookingRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub tracks: Arc<dyn TrackRepository>,
    pub changes: Arc<dyn ChangeRequestRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub walkers: Arc<dyn WalkerDirectory>,
    pub cooldowns: Arc<dyn CooldownStore>,
    pub dispatcher: Arc<dyn PushDispatcher>,
    pub chat: Arc<dyn ChatRooms>,
    pub text_generator: Option<Arc<dyn TextGenerator>>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn assemble(
        backends: Backends,
        rules: WalkRules,
        auth: AuthConfig,
        rate_limiter: Option<Arc<dyn RateLimiter>>,
        metrics: Metrics,
    ) -> Self {
        let live = LiveHub::new(256);
        let live_sink: Arc<dyn LiveBroadcast> = Arc::new(live.clone());

        let notifier = Arc::new(WalkNotifier::new(
            backends.users.clone(),
            backends.dispatcher,
            MessageComposer::new(backends.text_generator),
            backends.cooldowns.clone(),
            backends.clock.clone(),
            &rules,
        ));
        let scheduler = Arc::new(NotificationScheduler::new(
            backends.bookings.clone(),
            backends.tracks.clone(),
            notifier.clone(),
            backends.cooldowns,
            backends.clock.clone(),
            rules.clone(),
        ));
        let tracks = Arc::new(TrackStore::new(
            backends.bookings.clone(),
            backends.walkers.clone(),
            backends.tracks.clone(),
            LocationGuard::new(backends.tracks.clone(), rules.clone()),
            live_sink.clone(),
            backends.clock.clone(),
        ));
        let changes = Arc::new(ChangeNegotiator::new(
            backends.bookings.clone(),
            backends.changes,
            backends.walkers.clone(),
            backends.clock.clone(),
        ));
        let bookings = Arc::new(BookingService::new(BookingServiceDeps {
            bookings: backends.bookings,
            applications: backends.applications,
            tracks: backends.tracks,
            users: backends.users,
            walkers: backends.walkers,
            notifier: notifier.clone(),
            confirmations: ConfirmationOrchestrator::new(backends.chat, notifier.clone()),
            live: live_sink,
            clock: backends.clock,
            rules,
        }));

        Self {
            bookings,
            changes,
            tracks,
            notifier,
            scheduler,
            live,
            rate_limiter,
            metrics,
            auth,
        }
    }
}
