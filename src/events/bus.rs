//! Event Bus
//!
//! Named events with priority-ordered listeners. A bus is an explicitly owned
//! value; clones share the same listener table.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Result a listener returns
pub type ListenerResult = anyhow::Result<()>;

/// Something that reacts to a named event
pub trait Listener: Send + Sync {
    fn handle(&self, event: &str, payload: &Value) -> ListenerResult;
}

impl<F> Listener for F
where
    F: Fn(&str, &Value) -> ListenerResult + Send + Sync,
{
    fn handle(&self, event: &str, payload: &Value) -> ListenerResult {
        self(event, payload)
    }
}

/// Handle for one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    priority: i32,
    listener: Arc<dyn Listener>,
}

/// A listener that returned an error during dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerFailure {
    pub listener: ListenerId,
    pub priority: i32,
    pub message: String,
}

/// What happened during one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub event: String,
    /// Listeners invoked, successful or not
    pub invoked: usize,
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// In-process publish/subscribe keyed by event name
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<HashMap<String, Vec<Registration>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure; the same listener may be registered more than once
    ///
    /// Higher priorities run first. Equal priorities run in registration order.
    pub fn listen<F>(&self, event: &str, listener: F, priority: i32) -> ListenerId
    where
        F: Fn(&str, &Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.listen_arc(event, Arc::new(listener), priority)
    }

    /// Register a listener object
    pub fn subscribe<L>(&self, event: &str, listener: L, priority: i32) -> ListenerId
    where
        L: Listener + 'static,
    {
        self.listen_arc(event, Arc::new(listener), priority)
    }

    /// Register a shared listener
    pub fn listen_arc(&self, event: &str, listener: Arc<dyn Listener>, priority: i32) -> ListenerId {
        let id = ListenerId::new();
        let mut table = self.listeners.write();
        let entries = table.entry(event.to_string()).or_default();

        // After every entry with priority >= this one
        let position = entries.partition_point(|r| r.priority >= priority);
        entries.insert(position, Registration { id, priority, listener });

        debug!("Registered listener {} for '{}' at priority {}", id, event, priority);
        id
    }

    /// Invoke every listener for `event` in priority order
    ///
    /// A listener that errors or panics is logged and recorded; the rest still run.
    pub fn dispatch(&self, event: &str, payload: &Value) -> DispatchReport {
        let mut report = DispatchReport {
            event: event.to_string(),
            ..DispatchReport::default()
        };

        // Snapshot so listeners can register or forget while we iterate
        let snapshot: Vec<Registration> = match self.listeners.read().get(event) {
            Some(entries) if !entries.is_empty() => entries.clone(),
            _ => return report,
        };

        for registration in snapshot {
            report.invoked += 1;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| registration.listener.handle(event, payload)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(cause) => format!("listener panicked: {}", panic_message(cause.as_ref())),
            };
            error!("Listener {} failed handling '{}': {}", registration.id, event, message);
            report.failures.push(ListenerFailure {
                listener: registration.id,
                priority: registration.priority,
                message,
            });
        }

        report
    }

    /// Drop every listener for one event
    pub fn forget(&self, event: &str) {
        if self.listeners.write().remove(event).is_some() {
            debug!("Forgot listeners for '{}'", event);
        }
    }

    /// Drop one registration; true if it existed
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut table = self.listeners.write();
        let mut removed = false;
        for entries in table.values_mut() {
            let before = entries.len();
            entries.retain(|r| r.id != id);
            removed |= entries.len() != before;
        }
        table.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Drop every listener for every event
    pub fn flush(&self) {
        self.listeners.write().clear();
    }

    /// Same as `flush`, for test setup
    pub fn reset(&self) {
        self.flush();
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners.read().get(event).map(|e| !e.is_empty()).unwrap_or(false)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map(Vec::len).unwrap_or(0)
    }

    /// Event names with at least one listener, sorted
    pub fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.read().keys().cloned().collect();
        names.sort();
        names
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.listeners.read();
        f.debug_map()
            .entries(table.iter().map(|(event, entries)| (event, entries.len())))
            .finish()
    }
}
