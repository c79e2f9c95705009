//! Broker transport used by the Kafka trigger.
//!
//! A [`Transport`] hands out one fresh [`Producer`] per delivery. The
//! producer is owned by the call that requested it and is released when
//! it is dropped, whichever way the call ends.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as _};

use super::{ClientSettings, Mechanism};
use crate::trigger::DeliveryError;

/// Upper bound for the metadata round-trip that proves the brokers are reachable.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long librdkafka may keep a message queued before failing it.
const MESSAGE_TIMEOUT_MS: &str = "20000";

/// One outgoing message; `value` is the serialized item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub value: String,
}

/// A single produce request to one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    pub messages: Vec<Message>,
}

pub trait Transport: Send + Sync + 'static {
    type Producer: Producer;

    /// Build a producer for `client`. Does not connect yet.
    fn producer(&self, client: &ClientSettings) -> Result<Self::Producer, DeliveryError>;
}

#[async_trait]
pub trait Producer: Send {
    async fn connect(&mut self) -> Result<(), DeliveryError>;
    async fn send(&mut self, record: ProducerRecord) -> Result<(), DeliveryError>;
}

/// librdkafka-backed transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct RdKafka;

impl Transport for RdKafka {
    type Producer = RdKafkaProducer;

    fn producer(&self, client: &ClientSettings) -> Result<RdKafkaProducer, DeliveryError> {
        let inner: FutureProducer = client_config(client)
            .create()
            .map_err(|e| DeliveryError::Connect(Box::new(e)))?;
        Ok(RdKafkaProducer { inner })
    }
}

pub(crate) fn client_config(client: &ClientSettings) -> ClientConfig {
    let protocol = match (client.ssl, client.sasl.is_some()) {
        (false, false) => "plaintext",
        (true, false) => "ssl",
        (false, true) => "sasl_plaintext",
        (true, true) => "sasl_ssl",
    };

    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", client.brokers.join(","))
        .set("client.id", &client.client_id)
        .set("security.protocol", protocol)
        .set("message.timeout.ms", MESSAGE_TIMEOUT_MS);
    if let Some(sasl) = &client.sasl {
        config
            .set("sasl.mechanism", mechanism_name(sasl.mechanism))
            .set("sasl.username", &sasl.username)
            .set("sasl.password", &sasl.password);
    }
    config
}

fn mechanism_name(mechanism: Mechanism) -> &'static str {
    match mechanism {
        Mechanism::Plain => "PLAIN",
        Mechanism::ScramSha256 => "SCRAM-SHA-256",
        Mechanism::ScramSha512 => "SCRAM-SHA-512",
    }
}

pub struct RdKafkaProducer {
    inner: FutureProducer,
}

#[async_trait]
impl Producer for RdKafkaProducer {
    async fn connect(&mut self) -> Result<(), DeliveryError> {
        // Metadata fetching blocks, keep it off the runtime threads.
        let producer = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, CONNECT_TIMEOUT)
                .map(|_| ())
        })
        .await
        .map_err(|e| DeliveryError::Connect(Box::new(e)))?
        .map_err(|e| DeliveryError::Connect(Box::new(e)))
    }

    async fn send(&mut self, record: ProducerRecord) -> Result<(), DeliveryError> {
        // Enqueue everything first so the messages go out in order.
        let mut deliveries = Vec::with_capacity(record.messages.len());
        for message in &record.messages {
            let future = self
                .inner
                .send_result(FutureRecord::<(), String>::to(&record.topic).payload(&message.value))
                .map_err(|(e, _)| DeliveryError::Send(Box::new(e)))?;
            deliveries.push(future);
        }

        for delivery in join_all(deliveries).await {
            match delivery {
                Ok(Ok(_)) => {}
                Ok(Err((e, _))) => return Err(DeliveryError::Send(Box::new(e))),
                Err(canceled) => return Err(DeliveryError::Send(Box::new(canceled))),
            }
        }
        Ok(())
    }
}
