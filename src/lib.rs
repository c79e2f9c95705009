//! Container update notifications.
//!
//! Detectors publish container lifecycle facts on an [`event::EventHub`];
//! the [`dispatch`] wiring forwards them to pluggable delivery backends
//! implementing [`trigger::Trigger`].

pub mod config;
pub mod dispatch;
pub mod event;
pub mod trigger;
pub mod types;
pub mod watcher;
