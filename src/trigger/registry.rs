//! Lookup of trigger backends by kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::error::{ConfigurationError, TriggerError};
use super::{DynTrigger, Kafka, Trigger, TriggerMode};
use crate::config::{TriggerEntries, TriggerEntry};

type Constructor = fn(&Value) -> Result<Box<dyn DynTrigger>, ConfigurationError>;

fn construct<T: Trigger>(raw: &Value) -> Result<Box<dyn DynTrigger>, ConfigurationError> {
    let configuration = T::validate_configuration(raw)?;
    Ok(Box::new(T::init_trigger(configuration)?))
}

/// A ready trigger together with how it is wired to the hub.
#[derive(Clone)]
pub struct RegisteredTrigger {
    id: String,
    mode: TriggerMode,
    trigger: Arc<dyn DynTrigger>,
}

impl RegisteredTrigger {
    pub fn new(id: impl Into<String>, mode: TriggerMode, trigger: Arc<dyn DynTrigger>) -> Self {
        Self {
            id: id.into(),
            mode,
            trigger,
        }
    }

    /// `<kind>.<name>`, e.g. `kafka.local`.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    pub fn trigger(&self) -> &Arc<dyn DynTrigger> {
        &self.trigger
    }
}

pub struct Registry {
    constructors: BTreeMap<&'static str, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry knowing every built-in backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<Kafka>();
        registry
    }

    pub fn register<T: Trigger>(&mut self) {
        self.constructors.insert(T::KIND, construct::<T>);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Validate and initialize one trigger.
    pub fn create(
        &self,
        kind: &str,
        name: &str,
        entry: &TriggerEntry,
    ) -> Result<RegisteredTrigger, TriggerError> {
        let kind = kind.to_ascii_lowercase();
        let id = format!("{}.{}", kind, name.to_ascii_lowercase());
        let constructor = self
            .constructors
            .get(kind.as_str())
            .ok_or_else(|| TriggerError::UnknownKind(kind.clone()))?;

        let trigger = constructor(&Value::Object(entry.options.clone()))
            .map_err(|source| TriggerError::Configuration {
                id: id.clone(),
                source,
            })?;
        Ok(RegisteredTrigger::new(id, entry.mode, Arc::from(trigger)))
    }

    /// Create every configured trigger. One bad entry does not affect the others.
    pub fn create_all(
        &self,
        entries: &TriggerEntries,
    ) -> Vec<Result<RegisteredTrigger, TriggerError>> {
        entries
            .iter()
            .flat_map(|(kind, named)| {
                named
                    .iter()
                    .map(move |(name, entry)| self.create(kind, name, entry))
            })
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
