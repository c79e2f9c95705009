//! Container detection feeding the event hub.
//!
//! A [`Watcher`] observes the running containers on every tick; the
//! [`Tracker`] compares each observation with the previous one and
//! [`publish`] broadcasts the outcome on the hub.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::event::EventHub;
use crate::types::{Container, ContainerReport};

pub mod docker;
pub use docker::DockerWatcher;

#[async_trait]
pub trait Watcher {
    /// Watch the runtime until failure, publishing every detection cycle on `hub`.
    async fn watch(&self, hub: Arc<EventHub>) -> Result<()>;
}

/// A container that was seen but could not be fully inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationError {
    pub container: Container,
    pub detail: String,
}

pub type Observation = std::result::Result<Container, ObservationError>;

/// Everything one detection cycle found out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cycle {
    pub added: Vec<Container>,
    pub updated: Vec<Container>,
    pub removed: Vec<Container>,
    pub reports: Vec<ContainerReport>,
}

/// Remembers the containers of the previous cycle, keyed by [`Container::key`].
#[derive(Debug, Default)]
pub struct Tracker {
    known: HashMap<String, Container>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known(&self) -> usize {
        self.known.len()
    }

    /// Compare `observations` with the previous cycle and remember them.
    pub fn observe(&mut self, observations: Vec<Observation>) -> Cycle {
        let mut cycle = Cycle::default();
        let mut next = HashMap::with_capacity(observations.len());

        for observation in observations {
            match observation {
                Ok(mut container) => {
                    let key = container.key().to_string();
                    match self.known.get(&key) {
                        None => {
                            cycle.added.push(container.clone());
                            cycle.reports.push(ContainerReport::changed(container.clone()));
                        }
                        Some(previous) if previous.current_version != container.current_version => {
                            container.previous_version = previous.current_version.clone();
                            cycle.updated.push(container.clone());
                            cycle.reports.push(ContainerReport::changed(container.clone()));
                        }
                        Some(_) => {
                            cycle.reports.push(ContainerReport::unchanged(container.clone()));
                        }
                    }
                    next.insert(key, container);
                }
                Err(ObservationError { container, detail }) => {
                    let key = container.key().to_string();
                    // Keep what we knew; a failed check is not a removal.
                    if let Some(previous) = self.known.get(&key) {
                        next.insert(key, previous.clone());
                    }
                    cycle.reports.push(ContainerReport::failed(container, detail));
                }
            }
        }

        let mut removed: Vec<Container> = self
            .known
            .iter()
            .filter(|(key, _)| !next.contains_key(*key))
            .map(|(_, container)| container.clone())
            .collect();
        removed.sort_by(|a, b| a.key().cmp(b.key()));
        cycle.removed = removed;

        self.known = next;
        cycle
    }
}

/// Broadcast a cycle: lifecycle changes first, then per-container reports,
/// then the whole batch.
pub fn publish(hub: &EventHub, cycle: &Cycle) {
    for container in &cycle.added {
        hub.emit_container_added(container);
    }
    for container in &cycle.updated {
        hub.emit_container_updated(container);
    }
    for container in &cycle.removed {
        hub.emit_container_removed(container);
    }
    for report in &cycle.reports {
        hub.emit_container_report(report);
    }
    hub.emit_container_reports(&cycle.reports);
}
