//! Core Plugin Traits
//!
//! The capability surface every plugin implements. Only `boot` is required;
//! every other hook has a no-op default.

use std::any::Any;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::PluginResult;
use super::metadata::PluginMeta;
use super::paths::{PathConvention, PluginPaths};
use crate::events::EventBus;

/// Core plugin interface that all plugins must implement
pub trait Plugin: Send + Sync {
    /// Called once per enabled plugin per load cycle
    fn boot(&self, ctx: &BootContext<'_>) -> PluginResult<()>;

    /// Access to the concrete plugin type
    fn as_any(&self) -> &dyn Any;

    /// Called by the host when the plugin is first enabled
    fn installed(&self) -> PluginResult<()> {
        Ok(())
    }

    /// Called by the host when the plugin is removed
    fn uninstalled(&self) -> PluginResult<()> {
        Ok(())
    }

    /// Called by the host after the plugin's files were replaced by a newer version
    fn upgraded(&self, _old_version: &str) -> PluginResult<()> {
        Ok(())
    }

    /// Fields for the generated admin settings form, in display order
    fn config_fields(&self) -> Vec<ConfigField> {
        Vec::new()
    }

    /// Read a plugin setting
    ///
    /// Settings are not persisted yet, so this always yields `default`.
    fn config(&self, _key: &str, default: Value) -> Value {
        default
    }

    /// Resource paths for this plugin
    ///
    /// Override to supply explicit locations instead of the convention.
    fn paths(&self, root: &Path, convention: &PathConvention) -> PluginPaths {
        convention.resolve(root)
    }
}

/// Admin settings form field descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigField {
    pub fn new<N: Into<String>, L: Into<String>>(name: N, label: L, field_type: FieldType, default: Value) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type,
            default,
            description: None,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input widget type for a settings field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Boolean,
    Select,
    Url,
}

/// What a plugin sees while booting
pub struct BootContext<'a> {
    pub plugin_id: &'a str,
    pub meta: &'a PluginMeta,
    pub paths: &'a PluginPaths,
    pub events: &'a EventBus,
}

/// Lifecycle hook the host may trigger explicitly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleHook {
    Installed,
    Uninstalled,
    Upgraded { from: String },
}

impl LifecycleHook {
    /// Run this hook against a plugin
    pub fn run(&self, plugin: &dyn Plugin) -> PluginResult<()> {
        match self {
            LifecycleHook::Installed => plugin.installed(),
            LifecycleHook::Uninstalled => plugin.uninstalled(),
            LifecycleHook::Upgraded { from } => plugin.upgraded(from),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleHook::Installed => "installed",
            LifecycleHook::Uninstalled => "uninstalled",
            LifecycleHook::Upgraded { .. } => "upgraded",
        }
    }
}
