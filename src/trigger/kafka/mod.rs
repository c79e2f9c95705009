//! Kafka trigger: publishes one JSON record per container to a topic.
//!
//! Each delivery builds and connects its own producer and drops it when
//! done. Nothing is pooled between calls.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use super::error::{ConfigurationError, DeliveryError, Problem};
use super::schema::{Field, Schema};
use super::Trigger;
use crate::types::Container;

pub mod transport;

use transport::{Message, Producer, ProducerRecord, RdKafka, Transport};

pub const DEFAULT_TOPIC: &str = "wud-container";
pub const DEFAULT_CLIENT_ID: &str = "wud";

/// Deadline for connecting and sending within one delivery.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

const MECHANISMS: &[&str] = &["PLAIN", "SCRAM-SHA-256", "SCRAM-SHA-512"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mechanism {
    #[default]
    #[serde(rename = "PLAIN")]
    Plain,
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    #[serde(rename = "type", default)]
    pub mechanism: Mechanism,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaConfiguration {
    /// Comma or whitespace separated `host:port` list.
    pub brokers: String,
    pub topic: String,
    pub client_id: String,
    pub ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
}

/// SASL credentials attached to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sasl {
    pub mechanism: Mechanism,
    pub username: String,
    pub password: String,
}

/// Connection descriptor derived once from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub client_id: String,
    pub brokers: Vec<String>,
    pub ssl: bool,
    /// Only present when an authentication block was configured.
    pub sasl: Option<Sasl>,
}

pub struct Kafka<T = RdKafka> {
    configuration: KafkaConfiguration,
    client: ClientSettings,
    transport: T,
}

impl<T: Transport> Kafka<T> {
    /// Build a ready trigger that delivers through `transport`.
    pub fn with_transport(
        configuration: KafkaConfiguration,
        transport: T,
    ) -> Result<Self, ConfigurationError> {
        let client = client_settings(&configuration)?;
        Ok(Self {
            configuration,
            client,
            transport,
        })
    }

    pub fn client(&self) -> &ClientSettings {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn produce(&self, messages: Vec<Message>) -> Result<(), DeliveryError> {
        let record = ProducerRecord {
            topic: self.configuration.topic.clone(),
            messages,
        };
        debug!(
            "Sending {} message(s) to topic {}",
            record.messages.len(),
            record.topic
        );

        let mut producer = self.transport.producer(&self.client)?;
        timeout(DELIVERY_TIMEOUT, async {
            producer.connect().await?;
            producer.send(record).await
        })
        .await
        .map_err(|_| DeliveryError::Timeout(DELIVERY_TIMEOUT))?
    }
}

/// Split the broker list on commas and whitespace, dropping empty entries.
pub fn parse_brokers(brokers: &str) -> Vec<String> {
    brokers
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|broker| !broker.is_empty())
        .map(str::to_string)
        .collect()
}

fn client_settings(configuration: &KafkaConfiguration) -> Result<ClientSettings, ConfigurationError> {
    let brokers = parse_brokers(&configuration.brokers);
    if brokers.is_empty() {
        return Err(ConfigurationError::invalid(
            "brokers",
            Problem::Invalid("must list at least one broker".into()),
        ));
    }

    let sasl = configuration.authentication.as_ref().map(|auth| Sasl {
        mechanism: auth.mechanism,
        username: auth.user.clone(),
        password: auth.password.clone(),
    });

    Ok(ClientSettings {
        client_id: configuration.client_id.clone(),
        brokers,
        ssl: configuration.ssl,
        sasl,
    })
}

#[async_trait]
impl<T: Transport + Default> Trigger for Kafka<T> {
    const KIND: &'static str = "kafka";

    type Configuration = KafkaConfiguration;

    fn configuration_schema() -> Schema {
        Schema::new()
            .field(Field::string("brokers").required())
            .field(Field::string("topic").default(DEFAULT_TOPIC))
            .field(Field::string("client_id").default(DEFAULT_CLIENT_ID))
            .field(Field::boolean("ssl").default(false))
            .field(Field::object(
                "authentication",
                Schema::new()
                    .field(Field::one_of("type", MECHANISMS).default("PLAIN"))
                    .field(Field::string("user").required())
                    .field(Field::string("password").required().sensitive()),
            ))
    }

    fn init_trigger(configuration: KafkaConfiguration) -> Result<Self, ConfigurationError> {
        Self::with_transport(configuration, T::default())
    }

    fn configuration(&self) -> &KafkaConfiguration {
        &self.configuration
    }

    async fn trigger(&self, container: &Container) -> Result<(), DeliveryError> {
        let message = Message {
            value: serde_json::to_string(container)?,
        };
        self.produce(vec![message]).await
    }

    async fn trigger_batch(&self, containers: &[Container]) -> Result<(), DeliveryError> {
        if containers.is_empty() {
            return Ok(());
        }
        let messages = containers
            .iter()
            .map(|container| serde_json::to_string(container).map(|value| Message { value }))
            .collect::<Result<Vec<_>, _>>()?;
        self.produce(messages).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::trigger::mask::MASK;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory transport recording everything that would reach the broker.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct Recording {
        pub records: Arc<Mutex<Vec<ProducerRecord>>>,
        pub clients: Arc<Mutex<Vec<ClientSettings>>>,
        pub connects: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
        pub refuse_connection: bool,
    }

    pub(crate) struct RecordingProducer {
        transport: Recording,
    }

    impl Transport for Recording {
        type Producer = RecordingProducer;

        fn producer(&self, client: &ClientSettings) -> Result<RecordingProducer, DeliveryError> {
            self.clients.lock().unwrap().push(client.clone());
            Ok(RecordingProducer {
                transport: self.clone(),
            })
        }
    }

    #[async_trait]
    impl Producer for RecordingProducer {
        async fn connect(&mut self) -> Result<(), DeliveryError> {
            if self.transport.refuse_connection {
                return Err(DeliveryError::Connect("connection refused".into()));
            }
            self.transport.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&mut self, record: ProducerRecord) -> Result<(), DeliveryError> {
            self.transport.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    impl Drop for RecordingProducer {
        fn drop(&mut self) {
            self.transport.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    type TestKafka = Kafka<Recording>;

    fn ready(raw: serde_json::Value) -> TestKafka {
        let configuration = TestKafka::validate_configuration(&raw).unwrap();
        TestKafka::init_trigger(configuration).unwrap()
    }

    #[test]
    fn only_brokers_gets_defaults() {
        let configuration = TestKafka::validate_configuration(&json!({"brokers": "a:9092"})).unwrap();
        assert_eq!(
            configuration,
            KafkaConfiguration {
                brokers: "a:9092".into(),
                topic: "wud-container".into(),
                client_id: "wud".into(),
                ssl: false,
                authentication: None,
            }
        );
    }

    #[test]
    fn missing_brokers_is_named() {
        let err = TestKafka::validate_configuration(&json!({"topic": "t"})).unwrap_err();
        assert_eq!(err.fields(), vec!["brokers"]);
    }

    #[test]
    fn authentication_needs_user_and_password() {
        let err = TestKafka::validate_configuration(&json!({
            "brokers": "a:9092",
            "authentication": {"type": "SCRAM-SHA-256"}
        }))
        .unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["authentication.user", "authentication.password"]
        );
    }

    #[test]
    fn authentication_defaults_to_plain() {
        let configuration = TestKafka::validate_configuration(&json!({
            "brokers": "a:9092",
            "authentication": {"user": "bob", "password": "s3cret"}
        }))
        .unwrap();
        assert_eq!(
            configuration.authentication.unwrap().mechanism,
            Mechanism::Plain
        );
    }

    #[test]
    fn unknown_mechanism_and_option_are_rejected() {
        let err = TestKafka::validate_configuration(&json!({
            "brokers": "a:9092",
            "partitioner": "random",
            "authentication": {"type": "GSSAPI", "user": "bob", "password": "x"}
        }))
        .unwrap_err();
        assert_eq!(err.fields(), vec!["partitioner", "authentication.type"]);
    }

    #[test]
    fn ssl_must_be_boolean() {
        let err = TestKafka::validate_configuration(&json!({"brokers": "a", "ssl": 1})).unwrap_err();
        assert_eq!(err.fields(), vec!["ssl"]);
    }

    #[test]
    fn mask_hides_password_only() {
        let kafka = ready(json!({
            "brokers": "a:9092",
            "authentication": {"type": "SCRAM-SHA-512", "user": "bob", "password": "s3cret"}
        }));
        let masked = kafka.mask_configuration();

        assert_eq!(masked["authentication"]["user"], "bob");
        assert_eq!(masked["authentication"]["type"], "SCRAM-SHA-512");
        let password = masked["authentication"]["password"].as_str().unwrap();
        assert_eq!(password, MASK);
        assert!(!password.contains("s3cret"));
        assert_eq!(masked["brokers"], "a:9092");
        assert_eq!(kafka.configuration().authentication.as_ref().unwrap().password, "s3cret");
    }

    #[test]
    fn mask_without_authentication_has_no_block() {
        let masked = ready(json!({"brokers": "a:9092"})).mask_configuration();
        assert!(masked.get("authentication").is_none());
        assert_eq!(masked["topic"], "wud-container");
    }

    #[test]
    fn brokers_are_split_and_trimmed() {
        let kafka = ready(json!({"brokers": "a:9092, b:9092 ,c:9092"}));
        assert_eq!(kafka.client().brokers, vec!["a:9092", "b:9092", "c:9092"]);
        assert_eq!(parse_brokers("a:9092 b:9092\tc:9092"), vec!["a:9092", "b:9092", "c:9092"]);
    }

    #[test]
    fn empty_broker_list_fails_init() {
        let configuration = TestKafka::validate_configuration(&json!({"brokers": " , "})).unwrap();
        let err = TestKafka::init_trigger(configuration).err().unwrap();
        assert_eq!(err.fields(), vec!["brokers"]);
    }

    #[test]
    fn sasl_only_when_configured() {
        let plain = ready(json!({"brokers": "a:9092", "client_id": "me", "ssl": true}));
        assert_eq!(plain.client().client_id, "me");
        assert!(plain.client().ssl);
        assert!(plain.client().sasl.is_none());

        let authenticated = ready(json!({
            "brokers": "a:9092",
            "authentication": {"user": "bob", "password": "s3cret"}
        }));
        assert_eq!(
            authenticated.client().sasl,
            Some(Sasl {
                mechanism: Mechanism::Plain,
                username: "bob".into(),
                password: "s3cret".into(),
            })
        );
    }

    #[tokio::test]
    async fn trigger_sends_one_json_message() {
        let kafka = ready(json!({"brokers": "a:9092"}));
        kafka
            .trigger(&Container::new("c1", "nginx:1.25"))
            .await
            .unwrap();

        let records = kafka.transport().records.lock().unwrap().clone();
        assert_eq!(
            records,
            vec![ProducerRecord {
                topic: "wud-container".into(),
                messages: vec![Message {
                    value: r#"{"id":"c1","image":"nginx:1.25"}"#.into()
                }],
            }]
        );
    }

    #[tokio::test]
    async fn batch_keeps_input_order() {
        let kafka = ready(json!({"brokers": "a:9092", "topic": "updates"}));
        let containers = vec![
            Container::new("c1", "nginx:1.25"),
            Container::new("c2", "redis:7").with_name("cache"),
            Container::new("c3", "postgres:16"),
        ];
        kafka.trigger_batch(&containers).await.unwrap();

        let records = kafka.transport().records.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "updates");
        let bodies: Vec<_> = records[0].messages.iter().map(|m| m.value.clone()).collect();
        let expected: Vec<_> = containers
            .iter()
            .map(|c| serde_json::to_string(c).unwrap())
            .collect();
        assert_eq!(bodies, expected);
    }

    #[tokio::test]
    async fn empty_batch_does_not_touch_the_broker() {
        let kafka = ready(json!({"brokers": "a:9092"}));
        kafka.trigger_batch(&[]).await.unwrap();

        let transport = kafka.transport();
        assert!(transport.clients.lock().unwrap().is_empty());
        assert!(transport.records.lock().unwrap().is_empty());
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn every_call_uses_a_fresh_producer() {
        let kafka = ready(json!({"brokers": "a:9092"}));
        let container = Container::new("c1", "nginx:1.25");
        kafka.trigger(&container).await.unwrap();
        kafka.trigger_batch(&[container]).await.unwrap();

        let transport = kafka.transport();
        assert_eq!(transport.clients.lock().unwrap().len(), 2);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
        assert_eq!(transport.released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn connection_failure_is_reported_and_producer_released() {
        let configuration = TestKafka::validate_configuration(&json!({"brokers": "a:9092"})).unwrap();
        let transport = Recording {
            refuse_connection: true,
            ..Default::default()
        };
        let kafka = Kafka::with_transport(configuration, transport).unwrap();

        let err = kafka
            .trigger(&Container::new("c1", "nginx"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Connect(_)));
        assert!(kafka.transport().records.lock().unwrap().is_empty());
        assert_eq!(kafka.transport().released.load(Ordering::SeqCst), 1);
    }
}
