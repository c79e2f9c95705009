//! In-process event hub.
//!
//! Detectors publish container lifecycle facts on one of five fixed
//! channels; whoever registered on that channel (usually the trigger
//! dispatch wiring) is called back synchronously, in registration order,
//! on the emitting task.
//!
//! The hub is a plain value: build one with [`EventHub::new`] and share it
//! via `Arc<EventHub>`. Tests create as many isolated hubs as they like.
//!
//! A handler that returns an error is logged and skipped; the remaining
//! handlers of that emission still run.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

use crate::types::{Container, ContainerReport};

/// Error a handler may return. It never reaches the emitter.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

type Handler<T> = Arc<dyn Fn(&T) -> HandlerResult + Send + Sync>;

/// Identifier of one of the hub channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    ContainerAdded,
    ContainerUpdated,
    ContainerRemoved,
    ContainerReport,
    ContainerReports,
}

impl ChannelId {
    pub const ALL: [ChannelId; 5] = [
        ChannelId::ContainerAdded,
        ChannelId::ContainerUpdated,
        ChannelId::ContainerRemoved,
        ChannelId::ContainerReport,
        ChannelId::ContainerReports,
    ];

    /// Wire-stable channel name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelId::ContainerAdded => "container-added",
            ChannelId::ContainerUpdated => "container-updated",
            ChannelId::ContainerRemoved => "container-removed",
            ChannelId::ContainerReport => "container-report",
            ChannelId::ContainerReports => "container-reports",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named channel carrying payloads of type `T`.
pub struct Channel<T: ?Sized> {
    id: ChannelId,
    handlers: RwLock<Vec<Handler<T>>>,
}

impl<T: ?Sized> Channel<T> {
    fn new(id: ChannelId) -> Self {
        Self {
            id,
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Append a handler. Registering the same closure twice makes it run twice.
    pub fn register<F>(&self, handler: F)
    where
        F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Run every handler registered at call time, in order.
    ///
    /// The handler list is snapshotted first, so a handler may register
    /// further handlers without deadlocking; those only see later emits.
    pub fn emit(&self, payload: &T) {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        debug!("Emitting on {} to {} handler(s)", self.id, snapshot.len());

        for (index, handler) in snapshot.iter().enumerate() {
            if let Err(e) = handler(payload) {
                warn!("Handler #{} on {} failed: {}", index, self.id, e);
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The five container lifecycle channels.
pub struct EventHub {
    container_added: Channel<Container>,
    container_updated: Channel<Container>,
    container_removed: Channel<Container>,
    container_report: Channel<ContainerReport>,
    container_reports: Channel<[ContainerReport]>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            container_added: Channel::new(ChannelId::ContainerAdded),
            container_updated: Channel::new(ChannelId::ContainerUpdated),
            container_removed: Channel::new(ChannelId::ContainerRemoved),
            container_report: Channel::new(ChannelId::ContainerReport),
            container_reports: Channel::new(ChannelId::ContainerReports),
        }
    }

    pub fn emit_container_added(&self, container: &Container) {
        self.container_added.emit(container);
    }

    pub fn register_container_added<F>(&self, handler: F)
    where
        F: Fn(&Container) -> HandlerResult + Send + Sync + 'static,
    {
        self.container_added.register(handler);
    }

    pub fn emit_container_updated(&self, container: &Container) {
        self.container_updated.emit(container);
    }

    pub fn register_container_updated<F>(&self, handler: F)
    where
        F: Fn(&Container) -> HandlerResult + Send + Sync + 'static,
    {
        self.container_updated.register(handler);
    }

    pub fn emit_container_removed(&self, container: &Container) {
        self.container_removed.emit(container);
    }

    pub fn register_container_removed<F>(&self, handler: F)
    where
        F: Fn(&Container) -> HandlerResult + Send + Sync + 'static,
    {
        self.container_removed.register(handler);
    }

    pub fn emit_container_report(&self, report: &ContainerReport) {
        self.container_report.emit(report);
    }

    pub fn register_container_report<F>(&self, handler: F)
    where
        F: Fn(&ContainerReport) -> HandlerResult + Send + Sync + 'static,
    {
        self.container_report.register(handler);
    }

    pub fn emit_container_reports(&self, reports: &[ContainerReport]) {
        self.container_reports.emit(reports);
    }

    pub fn register_container_reports<F>(&self, handler: F)
    where
        F: Fn(&[ContainerReport]) -> HandlerResult + Send + Sync + 'static,
    {
        self.container_reports.register(handler);
    }

    /// Number of handlers currently registered on `channel`.
    pub fn handler_count(&self, channel: ChannelId) -> usize {
        match channel {
            ChannelId::ContainerAdded => self.container_added.handler_count(),
            ChannelId::ContainerUpdated => self.container_updated.handler_count(),
            ChannelId::ContainerRemoved => self.container_removed.handler_count(),
            ChannelId::ContainerReport => self.container_report.handler_count(),
            ChannelId::ContainerReports => self.container_reports.handler_count(),
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
