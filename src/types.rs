//! Data structures carried on the event hub and handed to triggers.
//!
//! These types are serialised using [`serde`](https://serde.rs/) and
//! published verbatim by delivery backends, so optional fields are
//! omitted from the JSON form instead of being written as `null`.

use serde::{Deserialize, Serialize};

/// Observed state of a single container.
///
/// The hub and the triggers never look inside; they only forward or
/// serialise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Image reference, e.g. `nginx:1.25`.
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
}

impl Container {
    pub fn new(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            image: image.into(),
            current_version: None,
            previous_version: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = Some(version.into());
        self
    }

    /// Name used to identify the container across detection cycles.
    /// Falls back to the id for unnamed containers.
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Result of checking one container during a detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Changed,
    Unchanged,
    Error,
}

/// A container plus what the last detection cycle concluded about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerReport {
    pub container: Container,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContainerReport {
    pub fn changed(container: Container) -> Self {
        Self {
            container,
            outcome: Outcome::Changed,
            error: None,
        }
    }

    pub fn unchanged(container: Container) -> Self {
        Self {
            container,
            outcome: Outcome::Unchanged,
            error: None,
        }
    }

    pub fn failed(container: Container, error: impl Into<String>) -> Self {
        Self {
            container,
            outcome: Outcome::Error,
            error: Some(error.into()),
        }
    }

    pub fn is_changed(&self) -> bool {
        self.outcome == Outcome::Changed
    }
}
