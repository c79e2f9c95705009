use super::{publish, Observation, ObservationError, Tracker, Watcher};
use crate::event::EventHub;
use crate::types::Container;
use anyhow::Result;
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::ContainerSummary;
use bollard::Docker;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Polls the local Docker daemon for running containers.
pub struct DockerWatcher {
    interval: Duration,
}

impl DockerWatcher {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    async fn connect() -> Result<Docker> {
        // Unix socket on Linux, honours DOCKER_HOST.
        Docker::connect_with_local_defaults().map_err(Into::into)
    }

    async fn observe(docker: &Docker) -> Result<Vec<Observation>> {
        let opts = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = docker.list_containers(Some(opts)).await?;
        Ok(containers.into_iter().filter_map(observation).collect())
    }
}

#[async_trait]
impl Watcher for DockerWatcher {
    async fn watch(&self, hub: Arc<EventHub>) -> Result<()> {
        let mut tracker = Tracker::new();
        let mut ticker = interval(self.interval);

        loop {
            ticker.tick().await;

            let docker = match Self::connect().await {
                Ok(d) => d,
                Err(e) => {
                    error!("Failed to connect to Docker: {}. Retrying next cycle...", e);
                    continue;
                }
            };

            match Self::observe(&docker).await {
                Ok(observations) => {
                    debug!("Observed {} running containers", observations.len());
                    let cycle = tracker.observe(observations);
                    info!(
                        "Detection cycle: {} added, {} updated, {} removed, {} checked",
                        cycle.added.len(),
                        cycle.updated.len(),
                        cycle.removed.len(),
                        cycle.reports.len()
                    );
                    publish(&hub, &cycle);
                }
                Err(e) => {
                    error!("Failed to list containers: {}. Retrying next cycle...", e);
                }
            }
        }
    }
}

/// Map a container summary to an observation. Summaries without an id are skipped.
fn observation(summary: ContainerSummary) -> Option<Observation> {
    let id = summary.id?;
    let name = summary
        .names
        .as_ref()
        .and_then(|n| n.first())
        .map(|n| n.trim_start_matches('/').to_string());

    let mut container = Container::new(id, summary.image.unwrap_or_default());
    container.name = name;

    match summary.image_id.filter(|image_id| !image_id.is_empty()) {
        Some(image_id) => Some(Ok(container.with_version(image_id))),
        None => Some(Err(ObservationError {
            container,
            detail: "image id unavailable".into(),
        })),
    }
}
