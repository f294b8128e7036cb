use async_trait::async_trait;
use petwalk_core::collaborators::{CollabResult, PushDispatcher, PushMessage};
use petwalk_shared::pii::Masked;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(_) => {
                info!(topic, key, "event published");
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic, key, error = %e, "failed to publish event");
                Err(e)
            }
        }
    }
}

/// Push payload handed to the delivery service through Kafka.
#[derive(Debug, Serialize)]
struct PushEnvelope<'a> {
    contact: &'a str,
    booking_id: Uuid,
    kind: &'a str,
    body: &'a str,
}

/// Push dispatcher that enqueues one record per message, keyed by booking so
/// a booking's notifications stay ordered on one partition.
pub struct KafkaPushDispatcher {
    producer: EventProducer,
    topic: String,
}

impl KafkaPushDispatcher {
    pub fn new(producer: EventProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

fn envelope(contact: &str, message: &PushMessage) -> serde_json::Result<String> {
    serde_json::to_string(&PushEnvelope {
        contact,
        booking_id: message.booking_id,
        kind: &message.kind,
        body: &message.body,
    })
}

#[async_trait]
impl PushDispatcher for KafkaPushDispatcher {
    async fn send(&self, contact: &str, message: &PushMessage) -> CollabResult<()> {
        let payload = envelope(contact, message)?;
        self.producer
            .publish(&self.topic, &message.booking_id.to_string(), &payload)
            .await?;
        info!(
            booking_id = %message.booking_id,
            kind = %message.kind,
            contact = %Masked(contact),
            "push enqueued"
        );
        Ok(())
    }
}
