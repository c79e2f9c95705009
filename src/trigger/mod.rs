//! Delivery backends ("triggers").
//!
//! Every backend implements [`Trigger`]. The trait encodes the lifecycle in
//! types: raw options are turned into the backend's typed configuration by
//! [`Trigger::validate_configuration`], and only a validated configuration can
//! be handed to [`Trigger::init_trigger`], which yields a ready backend. The
//! delivery methods therefore cannot be reached before setup.
//!
//! [`DynTrigger`] is the dyn-compatible view used once backends of different
//! kinds are stored side by side.

use async_trait::async_trait;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Container;

pub mod error;
pub mod kafka;
pub mod mask;
pub mod registry;
pub mod schema;

pub use error::{ConfigurationError, DeliveryError, FieldProblem, Problem, TriggerError};
pub use kafka::Kafka;
pub use registry::{RegisteredTrigger, Registry};
pub use schema::{Field, FieldType, Schema};

#[async_trait]
pub trait Trigger: Sized + Send + Sync + 'static {
    /// Backend name used as the registry key, e.g. `kafka`.
    const KIND: &'static str;

    type Configuration: Serialize + DeserializeOwned + Send + Sync;

    /// Options this backend accepts. Pure.
    fn configuration_schema() -> Schema;

    /// Apply the schema to raw options and decode the result.
    fn validate_configuration(raw: &Value) -> Result<Self::Configuration, ConfigurationError> {
        let validated = Self::configuration_schema().validate(raw)?;
        Ok(serde_json::from_value(validated)?)
    }

    /// One-time setup from a validated configuration. Must not open
    /// network connections.
    fn init_trigger(configuration: Self::Configuration) -> Result<Self, ConfigurationError>;

    fn configuration(&self) -> &Self::Configuration;

    /// Display-safe copy of the configuration, `null` if it cannot be
    /// represented as JSON.
    fn mask_configuration(&self) -> Value {
        match serde_json::to_value(self.configuration()) {
            Ok(configuration) => Self::configuration_schema().mask(&configuration),
            Err(e) => {
                warn!("Cannot display {} trigger configuration: {}", Self::KIND, e);
                Value::Null
            }
        }
    }

    /// Deliver one container.
    async fn trigger(&self, container: &Container) -> Result<(), DeliveryError>;

    /// Deliver several containers in one logical operation, keeping their order.
    async fn trigger_batch(&self, containers: &[Container]) -> Result<(), DeliveryError>;
}

/// Dyn-compatible view of a ready [`Trigger`].
#[async_trait]
pub trait DynTrigger: Send + Sync {
    fn kind(&self) -> &'static str;
    fn masked_configuration(&self) -> Value;
    async fn notify(&self, container: &Container) -> Result<(), DeliveryError>;
    async fn notify_batch(&self, containers: &[Container]) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<T: Trigger> DynTrigger for T {
    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn masked_configuration(&self) -> Value {
        self.mask_configuration()
    }

    async fn notify(&self, container: &Container) -> Result<(), DeliveryError> {
        self.trigger(container).await
    }

    async fn notify_batch(&self, containers: &[Container]) -> Result<(), DeliveryError> {
        self.trigger_batch(containers).await
    }
}

/// Which hub channel a trigger listens to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// One delivery per changed container report.
    #[default]
    Simple,
    /// One batched delivery per detection cycle.
    Batch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Backend whose configuration has no JSON form (non-string map keys).
    struct Opaque {
        configuration: BTreeMap<Vec<u8>, String>,
    }

    #[async_trait]
    impl Trigger for Opaque {
        const KIND: &'static str = "opaque";

        type Configuration = BTreeMap<Vec<u8>, String>;

        fn configuration_schema() -> Schema {
            Schema::new()
        }

        fn init_trigger(configuration: Self::Configuration) -> Result<Self, ConfigurationError> {
            Ok(Self { configuration })
        }

        fn configuration(&self) -> &Self::Configuration {
            &self.configuration
        }

        async fn trigger(&self, _container: &Container) -> Result<(), DeliveryError> {
            Ok(())
        }

        async fn trigger_batch(&self, _containers: &[Container]) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[test]
    fn unrepresentable_configuration_masks_to_null() {
        let mut configuration = BTreeMap::new();
        configuration.insert(vec![1, 2], "secret".to_string());
        let opaque = Opaque::init_trigger(configuration).unwrap();

        assert_eq!(opaque.mask_configuration(), Value::Null);
        assert_eq!(opaque.masked_configuration(), Value::Null);
    }
}
