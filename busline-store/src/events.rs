use async_trait::async_trait;
use busline_core::booking::BookingRecord;
use busline_core::ticketing::TicketDispatcher;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

/// Publishes confirmed bookings for the ticketing service to render and mail.
#[derive(Clone)]
pub struct KafkaTicketDispatcher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaTicketDispatcher {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer, topic: topic.into() })
    }
}

#[async_trait]
impl TicketDispatcher for KafkaTicketDispatcher {
    async fn dispatch_ticket(
        &self,
        record: &BookingRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(record)?;
        let key = record.booking.pnr.as_str();
        let message = FutureRecord::to(&self.topic).key(key).payload(&payload);

        match self.producer.send(message, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent ticket {} to {}: partition {} offset {}",
                    key, self.topic, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send ticket {} to {}: {}", key, self.topic, e);
                Err(Box::new(e))
            }
        }
    }
}
