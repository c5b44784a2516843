//! Application layer wiring CLI arguments, configuration and the plugin registry

pub mod execution;
pub mod initialization;

pub use execution::run_command;
pub use initialization::{build_registry, colours_enabled, configure_logging, enabled_plugins, load_configuration};
