use anyhow::Context;
use petwalk_api::{
    app,
    state::{AppState, AuthConfig, Backends, Metrics, RateLimiter, RedisRateLimiter},
    worker,
};
use petwalk_core::collaborators::TextGenerator;
use petwalk_core::SystemClock;
use petwalk_store::{
    app_config::Config, DbClient, EventProducer, HttpChatRooms, HttpTextGenerator, KafkaPushDispatcher,
    PgBookingRepository, PgChangeRequestRepository, PgDirectory, PgTrackRepository, RedisClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petwalk_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting PetWalk API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let booking_repo = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let directory = Arc::new(PgDirectory::new(db.pool.clone()));

    // Redis: cooldowns and rate limiting
    let redis = Arc::new(RedisClient::new(&config.redis.url).context("Failed to open Redis client")?);

    // Kafka: push transport
    let producer = EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;
    let dispatcher = Arc::new(KafkaPushDispatcher::new(producer, config.kafka.push_topic.clone()));

    // HTTP collaborators
    let timeout = config.collaborators.timeout();
    let chat = Arc::new(HttpChatRooms::new(&config.collaborators.chat_url, timeout)?);
    let text_generator = match &config.collaborators.text_generator_url {
        Some(url) => Some(Arc::new(HttpTextGenerator::new(url, timeout)?) as Arc<dyn TextGenerator>),
        None => None,
    };

    let rate_limiter: Arc<dyn RateLimiter> = Arc::new(RedisRateLimiter {
        redis: redis.clone(),
        requests: config.rate_limit.requests,
        window_seconds: config.rate_limit.window_seconds,
    });

    let backends = Backends {
        bookings: booking_repo.clone(),
        applications: booking_repo,
        tracks: Arc::new(PgTrackRepository::new(db.pool.clone())),
        changes: Arc::new(PgChangeRequestRepository::new(db.pool.clone())),
        users: directory.clone(),
        walkers: directory,
        cooldowns: redis,
        dispatcher,
        chat,
        text_generator,
        clock: Arc::new(SystemClock),
    };

    let metrics = Metrics::new().context("Failed to register metrics")?;
    let app_state = AppState::assemble(
        backends,
        config.walk_rules.clone(),
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        Some(rate_limiter),
        metrics.clone(),
    );

    worker::start_notification_worker(app_state.scheduler.clone(), metrics.notifications.clone());

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
