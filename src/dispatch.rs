//! Wires registered triggers to the event hub.
//!
//! Hub handlers are synchronous, so each delivery is spawned on the given
//! runtime and its outcome logged. Nothing is retried.

use std::sync::Arc;

use log::{error, info};
use tokio::runtime::Handle;

use crate::event::EventHub;
use crate::trigger::{DynTrigger, RegisteredTrigger, TriggerMode};
use crate::types::Container;

/// Subscribe every trigger to the channel matching its mode.
pub fn register_triggers(hub: &EventHub, triggers: &[RegisteredTrigger], runtime: &Handle) {
    for registered in triggers {
        let id: Arc<str> = Arc::from(registered.id());
        let trigger = Arc::clone(registered.trigger());
        let runtime = runtime.clone();

        match registered.mode() {
            TriggerMode::Simple => hub.register_container_report(move |report| {
                if report.is_changed() {
                    spawn_single(&runtime, &id, &trigger, report.container.clone());
                }
                Ok(())
            }),
            TriggerMode::Batch => hub.register_container_reports(move |reports| {
                let changed: Vec<Container> = reports
                    .iter()
                    .filter(|report| report.is_changed())
                    .map(|report| report.container.clone())
                    .collect();
                if !changed.is_empty() {
                    spawn_batch(&runtime, &id, &trigger, changed);
                }
                Ok(())
            }),
        }
        info!(
            "Trigger {} listening in {:?} mode",
            registered.id(),
            registered.mode()
        );
    }
}

fn spawn_single(runtime: &Handle, id: &Arc<str>, trigger: &Arc<dyn DynTrigger>, container: Container) {
    let id = Arc::clone(id);
    let trigger = Arc::clone(trigger);
    runtime.spawn(async move {
        if let Err(e) = trigger.notify(&container).await {
            error!("Trigger {} failed for container {}: {}", id, container.key(), e);
        }
    });
}

fn spawn_batch(
    runtime: &Handle,
    id: &Arc<str>,
    trigger: &Arc<dyn DynTrigger>,
    containers: Vec<Container>,
) {
    let id = Arc::clone(id);
    let trigger = Arc::clone(trigger);
    runtime.spawn(async move {
        if let Err(e) = trigger.notify_batch(&containers).await {
            error!(
                "Trigger {} failed for a batch of {} container(s): {}",
                id,
                containers.len(),
                e
            );
        }
    });
}
