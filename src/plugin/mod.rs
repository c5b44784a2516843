//! Plugin System Module
//!
//! Discovers plugin main classes from a class map, keeps their metadata and
//! instances in a registry, exposes their resources to the host and boots the
//! enabled ones.
//!
//! # Example Usage
//!
//! ```no_run
//! use gamecms::events::EventBus;
//! use gamecms::plugin::{builtin, LoaderConfig, PluginRegistry};
//! use std::path::Path;
//!
//! let registry = PluginRegistry::new(
//!     Box::new(builtin::class_map(Path::new("plugins"))),
//!     builtin::class_table(),
//!     LoaderConfig::default(),
//! );
//!
//! let bus = EventBus::new();
//! let report = registry.boot_plugins(&["blog", "shop"], &bus);
//! println!("booted: {:?}", report.booted);
//! ```

pub mod builtin;
pub mod classmap;
pub mod compatibility;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod metadata;
pub mod paths;
pub mod registry;
pub mod traits;

#[cfg(test)]
pub mod tests;

// Re-export core types for easier access
pub use classmap::{ClassDecl, ClassMap, ClassMapFile, ClassMapSource, ClassName, ClassTable};
pub use compatibility::{DependencyChecker, DependencyIssue, CORE_VERSION};
pub use discovery::{DiscoveredPlugin, DiscoveryReport, LoaderConfig, RejectionReason, DEFAULT_NAMESPACE};
pub use error::{PluginError, PluginResult};
pub use manifest::PluginManifest;
pub use metadata::PluginMeta;
pub use paths::{PathConvention, PluginPaths, ResourceKind};
pub use registry::{BootFailure, BootReport, PluginMap, PluginRegistry, SharedPluginRegistry};
pub use traits::{BootContext, ConfigField, FieldType, LifecycleHook, Plugin};
