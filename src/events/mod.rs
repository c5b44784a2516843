//! Plugin Event Bus
//!
//! A lightweight in-process publish/subscribe mechanism plugins use to talk to
//! each other and to the host, separate from the host framework's own events.
//!
//! # Example Usage
//!
//! ```no_run
//! use gamecms::events::EventBus;
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//! bus.listen("vote.cast", |_event, payload| {
//!     log::info!("vote from {}", payload["player"]);
//!     Ok(())
//! }, 10);
//!
//! let report = bus.dispatch("vote.cast", &json!({"player": "steve"}));
//! assert_eq!(report.invoked, 1);
//! ```

pub mod bus;
pub mod listeners;

#[cfg(test)]
mod tests;

pub use bus::{DispatchReport, EventBus, Listener, ListenerFailure, ListenerId, ListenerResult};
pub use listeners::{listener_class_name, studly_case, ListenerCatalog, ListenerFactory};

/// Published by a plugin once its boot hook has completed
pub const PLUGIN_BOOTED: &str = "plugin.booted";
