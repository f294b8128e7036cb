pub mod app_config;
pub mod booking_repo;
pub mod change_repo;
pub mod database;
pub mod directory_repo;
pub mod events;
pub mod http;
pub mod redis_repo;
pub mod track_repo;

pub use booking_repo::PgBookingRepository;
pub use change_repo::PgChangeRequestRepository;
pub use database::DbClient;
pub use directory_repo::PgDirectory;
pub use events::{EventProducer, KafkaPushDispatcher};
pub use http::{HttpChatRooms, HttpTextGenerator};
pub use redis_repo::RedisClient;
pub use track_repo::PgTrackRepository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Corrupt row: {0}")]
    Decode(String),
}
