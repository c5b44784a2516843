//! Plugin Manifest
//!
//! Optional `plugin.json` / `plugin.yaml` beside a plugin's sources. The core
//! reads the events a plugin wants listeners wired for.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{PluginError, PluginResult};

/// Manifest file names, in lookup order
pub const MANIFEST_FILES: [&str; 3] = ["plugin.json", "plugin.yaml", "plugin.yml"];

/// Wiring hints read from a plugin's manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Event names the plugin ships listeners for
    #[serde(default, alias = "listeners")]
    pub events: Vec<String>,
}

impl PluginManifest {
    /// Find and parse the manifest in a plugin root; none found is an empty manifest
    pub fn load(root: &Path) -> PluginResult<Self> {
        match Self::locate(root) {
            Some(path) => PluginManifestParser::new().parse_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// First manifest file present in `root`
    pub fn locate(root: &Path) -> Option<PathBuf> {
        MANIFEST_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }
}

/// Parser for manifest files
#[derive(Debug, Default)]
pub struct PluginManifestParser {}

impl PluginManifestParser {
    pub fn new() -> Self {
        Self {}
    }

    pub fn parse_json(&self, content: &str) -> PluginResult<PluginManifest> {
        serde_json::from_str(content)
            .map_err(|e| PluginError::descriptor_parse_error(format!("Failed to parse JSON manifest: {}", e)))
    }

    pub fn parse_yaml(&self, content: &str) -> PluginResult<PluginManifest> {
        // An empty YAML document is an empty manifest
        if content.trim().is_empty() {
            return Ok(PluginManifest::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| PluginError::descriptor_parse_error(format!("Failed to parse YAML manifest: {}", e)))
    }

    pub fn parse_file(&self, path: &Path) -> PluginResult<PluginManifest> {
        let content = fs::read_to_string(path).map_err(|e| {
            PluginError::descriptor_parse_error(format!("Failed to read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => self.parse_yaml(&content),
            _ => self.parse_json(&content),
        }
    }
}
