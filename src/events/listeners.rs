//! Convention-based listener wiring
//!
//! A plugin lists event names in its manifest and ships one listener per
//! event at `<namespace>\<Plugin>\Listeners\<Event>Listener`. The catalog is
//! the side table that maps those class names to listener constructors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use super::bus::{EventBus, Listener};
use crate::plugin::manifest::PluginManifest;

/// Builds one listener instance
pub type ListenerFactory = Arc<dyn Fn() -> Arc<dyn Listener> + Send + Sync>;

/// Listener constructors by class name
#[derive(Clone, Default)]
pub struct ListenerCatalog {
    factories: HashMap<String, ListenerFactory>,
}

impl ListenerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a listener class
    pub fn declare<L, F>(&mut self, class: &str, factory: F)
    where
        L: Listener + 'static,
        F: Fn() -> L + Send + Sync + 'static,
    {
        self.factories.insert(
            normalize(class),
            Arc::new(move || Arc::new(factory()) as Arc<dyn Listener>),
        );
    }

    pub fn with<L, F>(mut self, class: &str, factory: F) -> Self
    where
        L: Listener + 'static,
        F: Fn() -> L + Send + Sync + 'static,
    {
        self.declare(class, factory);
        self
    }

    /// Instantiate a listener class, if declared
    pub fn resolve(&self, class: &str) -> Option<Arc<dyn Listener>> {
        self.factories.get(&normalize(class)).map(|factory| factory())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ListenerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

fn normalize(class: &str) -> String {
    class.replace("::", "\\").trim_start_matches('\\').to_string()
}

/// `user.registered` -> `UserRegistered`
pub fn studly_case(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Conventional listener class for a plugin's event
pub fn listener_class_name(namespace: &str, plugin_id: &str, event: &str) -> String {
    format!(
        "{}\\{}\\Listeners\\{}Listener",
        normalize(namespace),
        studly_case(plugin_id),
        studly_case(event)
    )
}

impl EventBus {
    /// Wire the listeners a plugin's manifest asks for
    ///
    /// Events without a declared listener class are skipped. Returns how many
    /// listeners were registered.
    pub fn register_plugin_listeners(
        &self,
        namespace: &str,
        plugin_id: &str,
        manifest: &PluginManifest,
        catalog: &ListenerCatalog,
    ) -> usize {
        let mut registered = 0;

        for event in &manifest.events {
            let class = listener_class_name(namespace, plugin_id, event);
            match catalog.resolve(&class) {
                Some(listener) => {
                    self.listen_arc(event, listener, 0);
                    registered += 1;
                }
                None => debug!("No listener {} for plugin '{}' event '{}'", class, plugin_id, event),
            }
        }

        registered
    }
}
