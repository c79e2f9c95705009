//! wud-notify daemon entry point.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::signal;

use wud_notify::config::Config;
use wud_notify::dispatch::register_triggers;
use wud_notify::event::EventHub;
use wud_notify::trigger::Registry;
use wud_notify::watcher::{DockerWatcher, Watcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load configuration
    let cfg = Config::load()?;

    // Triggers
    let registry = Registry::with_defaults();
    let mut triggers = Vec::new();
    for result in registry.create_all(&cfg.trigger) {
        match result {
            Ok(trigger) => {
                info!(
                    "Registered trigger {} with configuration {}",
                    trigger.id(),
                    trigger.trigger().masked_configuration()
                );
                triggers.push(trigger);
            }
            Err(e) => error!("Skipping trigger: {}", e),
        }
    }
    if triggers.is_empty() {
        warn!("No trigger configured, changes will only be logged");
    }

    // Event hub
    let hub = Arc::new(EventHub::new());
    hub.register_container_added(|c| {
        info!("Container added: {} ({})", c.key(), c.image);
        Ok(())
    });
    hub.register_container_updated(|c| {
        info!("Container updated: {} ({})", c.key(), c.image);
        Ok(())
    });
    hub.register_container_removed(|c| {
        info!("Container removed: {}", c.key());
        Ok(())
    });
    hub.register_container_report(|r| {
        debug!("Container report: {} -> {:?}", r.container.key(), r.outcome);
        Ok(())
    });
    register_triggers(&hub, &triggers, &Handle::current());

    // Watcher
    let watcher_handle = if cfg.watcher.enabled {
        let watcher = DockerWatcher::new(cfg.watcher.interval());
        let hub = Arc::clone(&hub);
        Some(tokio::spawn(async move {
            if let Err(e) = watcher.watch(hub).await {
                error!("Container watcher failed: {}", e);
            }
        }))
    } else {
        info!("Container watcher disabled");
        None
    };

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    if let Some(handle) = watcher_handle {
        handle.abort();
    }

    info!("Shutdown complete.");
    Ok(())
}
