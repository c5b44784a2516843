//! Plugin Metadata
//!
//! The immutable descriptor a plugin's main class declares: identity, display
//! strings, dependency constraints and the permission keys it wants seeded.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{PluginError, PluginResult};

/// Dependency key that refers to the host core rather than another plugin
pub const CORE_DEPENDENCY: &str = "core";

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("static id pattern"))
}

/// Plugin metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMeta {
    /// Stable lowercase slug, unique across discovered plugins
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub version: String,

    #[serde(default)]
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Plugin id (or `core`) to version constraint
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// Permission keys in declaration order
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl PluginMeta {
    /// Create metadata with the required identity fields
    pub fn new<I, N, V>(id: I, name: N, version: V) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: version.into(),
            author: String::new(),
            url: None,
            dependencies: BTreeMap::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author<S: Into<String>>(mut self, author: S) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Declare a dependency on another plugin id (or `core`)
    pub fn with_dependency<I: Into<String>, C: Into<String>>(mut self, id: I, constraint: C) -> Self {
        self.dependencies.insert(id.into(), constraint.into());
        self
    }

    /// Declare permission keys; first occurrence wins for duplicates
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for permission in permissions {
            let permission = permission.into();
            if !self.permissions.contains(&permission) {
                self.permissions.push(permission);
            }
        }
        self
    }

    /// Check the declaration is usable as a registry key
    pub fn validate(&self) -> PluginResult<()> {
        if !is_valid_id(&self.id) {
            return Err(PluginError::invalid_metadata(format!(
                "plugin id '{}' must be a lowercase slug", self.id
            )));
        }

        if let Some(bad) = self.permissions.iter().find(|p| p.trim().is_empty()) {
            return Err(PluginError::invalid_metadata(format!(
                "plugin '{}' declares an empty permission key '{}'", self.id, bad
            )));
        }

        Ok(())
    }

    /// Plugin dependencies, excluding the core entry
    pub fn plugin_dependencies(&self) -> impl Iterator<Item = (&String, &String)> {
        self.dependencies.iter().filter(|(id, _)| id.as_str() != CORE_DEPENDENCY)
    }
}

/// Whether `id` is a lowercase slug
pub fn is_valid_id(id: &str) -> bool {
    id_pattern().is_match(id)
}

/// Resolve a plugin's id: the declared id, else the lowercased short class name
///
/// The fallback is not guaranteed unique.
pub fn plugin_id(short_class_name: &str, meta: Option<&PluginMeta>) -> String {
    match meta {
        Some(meta) => meta.id.clone(),
        None => short_class_name.to_lowercase(),
    }
}
