//! Plugin Registry
//!
//! Lazily discovers plugins from a class map, answers queries about them and
//! runs their boot hooks. Discovery happens once per load cycle; every query
//! triggers it on first use.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Index;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::{ReentrantMutex, RwLock};
use serde::{Serialize, Serializer};

use super::classmap::{ClassMap, ClassMapSource, ClassTable};
use super::compatibility::{DependencyChecker, DependencyIssue};
use super::discovery::{DiscoveredPlugin, DiscoveryReport, LoaderConfig, PluginScanner};
use super::error::{PluginError, PluginResult};
use super::manifest::PluginManifest;
use super::metadata::PluginMeta;
use super::paths::{PluginPaths, ResourceKind};
use super::traits::{BootContext, LifecycleHook, Plugin};
use crate::events::{EventBus, ListenerCatalog};

/// A boot hook that returned an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootFailure {
    pub id: String,
    pub error: String,
}

/// What happened during one `boot_plugins` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootReport {
    /// Booted successfully, in boot order
    pub booted: Vec<String>,
    pub failed: Vec<BootFailure>,
    /// Enabled ids with no discovered plugin
    pub unknown: Vec<String>,
    /// Already booted earlier in this load cycle
    pub skipped: Vec<String>,
    pub dependency_issues: Vec<DependencyIssue>,
}

impl BootReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.unknown.is_empty() && self.dependency_issues.is_empty()
    }
}

/// Values keyed by plugin id, in discovery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMap<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for PluginMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> PluginMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced entry keeps its position
    pub fn insert(&mut self, id: String, value: T) {
        match self.index.get(&id) {
            Some(&slot) => self.entries[slot].1 = value,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, value));
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entries.iter().map(|(id, value)| (id, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn into_keys(self) -> impl Iterator<Item = String> {
        self.entries.into_iter().map(|(id, _)| id)
    }
}

impl<T> FromIterator<(String, T)> for PluginMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (id, value) in iter {
            map.insert(id, value);
        }
        map
    }
}

impl<T> IntoIterator for PluginMap<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<T> Index<&str> for PluginMap<T> {
    type Output = T;

    fn index(&self, id: &str) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("no plugin '{}' in map", id),
        }
    }
}

impl<T: Serialize> Serialize for PluginMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Clears the scanning flag, also when a plugin factory panics
struct ScanFlag<'a>(&'a Cell<bool>);

impl Drop for ScanFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Default)]
struct RegistryState {
    loaded: bool,
    plugins: PluginMap<DiscoveredPlugin>,
    report: DiscoveryReport,
    booted: BTreeSet<String>,
}

/// Registry of discovered plugins
pub struct PluginRegistry {
    source: Box<dyn ClassMapSource>,
    classes: ClassTable,
    config: LoaderConfig,
    checker: DependencyChecker,
    state: RwLock<RegistryState>,
    /// Serialises scans; set while this thread is inside one
    scanning: ReentrantMutex<Cell<bool>>,
}

impl PluginRegistry {
    /// Create a registry; nothing is scanned until first use
    pub fn new(source: Box<dyn ClassMapSource>, classes: ClassTable, config: LoaderConfig) -> Self {
        Self {
            source,
            classes,
            config,
            checker: DependencyChecker::default(),
            state: RwLock::new(RegistryState::default()),
            scanning: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Use a different checker, e.g. to pin the core version in tests
    pub fn with_checker(mut self, checker: DependencyChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Scan the class map unless already done in this load cycle
    ///
    /// A class map that cannot be read is logged and leaves the registry empty.
    pub fn discover(&self) -> DiscoveryReport {
        if let Some(report) = self.cached_report() {
            return report;
        }

        // Plugin code runs during the scan, so the state lock is not held
        let scanning = self.scanning.lock();
        if let Some(report) = self.cached_report() {
            return report;
        }
        if scanning.get() {
            debug!("Registry queried while scanning; answering from the empty state");
            return self.state.read().report.clone();
        }

        scanning.set(true);
        let _flag = ScanFlag(&*scanning);
        let map = match self.source.load_class_map() {
            Ok(map) => map,
            Err(e) => {
                error!("Failed to load class map: {}", e);
                ClassMap::new()
            }
        };
        let outcome = PluginScanner::new(&self.classes, &self.config).scan(&map);

        info!(
            "Discovered {} plugin(s) from {} class map entries ({} skipped, {} warnings)",
            outcome.plugins.len(),
            map.len(),
            outcome.report.rejections.len(),
            outcome.report.warning_count()
        );

        let mut state = self.state.write();
        state.plugins = outcome
            .plugins
            .into_iter()
            .map(|plugin| (plugin.id.clone(), plugin))
            .collect();
        state.report = outcome.report;
        state.loaded = true;
        state.report.clone()
    }

    fn cached_report(&self) -> Option<DiscoveryReport> {
        let state = self.state.read();
        state.loaded.then(|| state.report.clone())
    }

    /// Report from the most recent scan
    pub fn report(&self) -> DiscoveryReport {
        self.discover()
    }

    /// Plugin instances by id, in discovery order
    pub fn plugins(&self) -> PluginMap<Arc<dyn Plugin>> {
        self.discover();
        self.state
            .read()
            .plugins
            .iter()
            .map(|(id, p)| (id.clone(), Arc::clone(&p.instance)))
            .collect()
    }

    /// Plugin metadata by id
    pub fn plugins_meta(&self) -> PluginMap<PluginMeta> {
        self.discover();
        self.state
            .read()
            .plugins
            .iter()
            .map(|(id, p)| (id.clone(), p.meta.clone()))
            .collect()
    }

    /// Everything known about one plugin
    pub fn plugin(&self, id: &str) -> Option<DiscoveredPlugin> {
        self.discover();
        self.state.read().plugins.get(id).cloned()
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.discover();
        self.state.read().plugins.contains_key(id)
    }

    pub fn plugin_count(&self) -> usize {
        self.discover();
        self.state.read().plugins.len()
    }

    /// Main class name of a plugin, with `\` separators
    pub fn class_name(&self, id: &str) -> Option<String> {
        self.discover();
        self.state.read().plugins.get(id).map(|p| p.class.to_string())
    }

    pub fn plugin_paths(&self, id: &str) -> Option<PluginPaths> {
        self.discover();
        self.state.read().plugins.get(id).map(|p| p.paths.clone())
    }

    /// Plugins whose `routes` file exists
    pub fn routes_files(&self) -> PluginMap<PathBuf> {
        self.resource_map(ResourceKind::ROUTES)
    }

    pub fn admin_routes_files(&self) -> PluginMap<PathBuf> {
        self.resource_map(ResourceKind::ADMIN_ROUTES)
    }

    pub fn migration_paths(&self) -> PluginMap<PathBuf> {
        self.resource_map(ResourceKind::MIGRATIONS)
    }

    pub fn view_paths(&self) -> PluginMap<PathBuf> {
        self.resource_map(ResourceKind::VIEWS)
    }

    pub fn lang_paths(&self) -> PluginMap<PathBuf> {
        self.resource_map(ResourceKind::LANG)
    }

    fn resource_map(&self, kind: ResourceKind) -> PluginMap<PathBuf> {
        self.discover();
        self.state
            .read()
            .plugins
            .iter()
            .filter(|(_, p)| p.resources.contains(kind))
            .filter_map(|(id, p)| p.paths.get(kind).map(|path| (id.clone(), path.to_path_buf())))
            .collect()
    }

    /// Permission keys each plugin declares, in declaration order
    pub fn declared_permissions(&self) -> PluginMap<Vec<String>> {
        self.discover();
        self.state
            .read()
            .plugins
            .iter()
            .filter(|(_, p)| !p.meta.permissions.is_empty())
            .map(|(id, p)| (id.clone(), p.meta.permissions.clone()))
            .collect()
    }

    /// Boot the enabled plugins in the given order
    ///
    /// Each plugin boots at most once per load cycle. A failing boot hook is
    /// logged and recorded; the remaining plugins still boot.
    pub fn boot_plugins<S: AsRef<str>>(&self, enabled: &[S], bus: &EventBus) -> BootReport {
        self.discover();
        let mut report = BootReport {
            dependency_issues: self.enabled_dependency_issues(enabled),
            ..BootReport::default()
        };

        for issue in &report.dependency_issues {
            warn!("Dependency problem: {}", issue);
        }

        for id in enabled {
            let id = id.as_ref();

            // Clone out and release the lock before running plugin code
            let plugin = {
                let mut state = self.state.write();
                let plugin = match state.plugins.get(id).cloned() {
                    Some(plugin) => plugin,
                    None => {
                        warn!("Enabled plugin '{}' was not discovered", id);
                        report.unknown.push(id.to_string());
                        continue;
                    }
                };
                if !state.booted.insert(id.to_string()) {
                    debug!("Plugin '{}' already booted", id);
                    report.skipped.push(id.to_string());
                    continue;
                }
                plugin
            };

            let ctx = BootContext {
                plugin_id: &plugin.id,
                meta: &plugin.meta,
                paths: &plugin.paths,
                events: bus,
            };

            match plugin.instance.boot(&ctx) {
                Ok(()) => {
                    debug!("Booted plugin '{}'", id);
                    report.booted.push(id.to_string());
                }
                Err(e) => {
                    error!("Plugin '{}' failed to boot: {}", id, e);
                    report.failed.push(BootFailure {
                        id: id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Booted {} plugin(s), {} failed, {} unknown",
            report.booted.len(),
            report.failed.len(),
            report.unknown.len()
        );
        report
    }

    fn enabled_dependency_issues<S: AsRef<str>>(&self, enabled: &[S]) -> Vec<DependencyIssue> {
        let state = self.state.read();
        let available: BTreeMap<String, PluginMeta> = enabled
            .iter()
            .filter_map(|id| state.plugins.get(id.as_ref()))
            .map(|p| (p.id.clone(), p.meta.clone()))
            .collect();

        available
            .values()
            .flat_map(|meta| self.checker.check(meta, &available))
            .collect()
    }

    /// Whether a plugin has been booted in this load cycle
    pub fn is_booted(&self, id: &str) -> bool {
        self.state.read().booted.contains(id)
    }

    /// Reorder `enabled` so dependencies boot first
    pub fn boot_order<S: AsRef<str>>(&self, enabled: &[S]) -> PluginResult<Vec<String>> {
        let enabled: Vec<String> = enabled.iter().map(|id| id.as_ref().to_string()).collect();
        let metas: BTreeMap<String, PluginMeta> = self.plugins_meta().into_iter().collect();
        self.checker.boot_order(&enabled, &metas)
    }

    pub fn install(&self, id: &str) -> PluginResult<()> {
        self.run_hook(id, LifecycleHook::Installed)
    }

    pub fn uninstall(&self, id: &str) -> PluginResult<()> {
        self.run_hook(id, LifecycleHook::Uninstalled)
    }

    pub fn upgrade(&self, id: &str, old_version: &str) -> PluginResult<()> {
        self.run_hook(id, LifecycleHook::Upgraded { from: old_version.to_string() })
    }

    fn run_hook(&self, id: &str, hook: LifecycleHook) -> PluginResult<()> {
        let plugin = self.plugin(id).ok_or_else(|| PluginError::plugin_not_found(id))?;
        info!("Running {} hook for plugin '{}'", hook.name(), id);
        hook.run(plugin.instance.as_ref()).map_err(|e| {
            PluginError::lifecycle_failed(format!("{} hook of '{}' failed: {}", hook.name(), id, e))
        })
    }

    /// Manifest from a plugin's root directory
    pub fn manifest(&self, id: &str) -> PluginResult<PluginManifest> {
        let plugin = self.plugin(id).ok_or_else(|| PluginError::plugin_not_found(id))?;
        PluginManifest::load(&plugin.root)
    }

    /// Wire a plugin's conventional listeners; returns how many were registered
    pub fn register_listeners(&self, id: &str, bus: &EventBus, catalog: &ListenerCatalog) -> PluginResult<usize> {
        let manifest = self.manifest(id)?;
        Ok(bus.register_plugin_listeners(&self.config.namespace, id, &manifest, catalog))
    }

    /// Forget everything; the next query scans again
    pub fn clear_cache(&self) {
        *self.state.write() = RegistryState::default();
        debug!("Plugin registry cache cleared");
    }
}

/// One registry handed to many components
pub type SharedPluginRegistry = Arc<PluginRegistry>;
