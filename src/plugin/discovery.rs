//! Plugin Discovery
//!
//! Walks the class map, keeps only plugin main classes that pass every
//! structural check, and instantiates one plugin per declared id. A broken
//! candidate never stops the scan; it is recorded in the report with the
//! check that rejected it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use super::classmap::{ClassMap, ClassName, ClassTable};
use super::metadata::PluginMeta;
use super::paths::{PathConvention, PluginPaths, ResourceKind};
use super::traits::Plugin;

/// Namespace plugin main classes live under unless configured otherwise
pub const DEFAULT_NAMESPACE: &str = "Plugins";

/// Settings shared by discovery and the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Reserved plugin namespace prefix
    pub namespace: String,

    /// Resource layout inside each plugin root
    pub convention: PathConvention,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            convention: PathConvention::default(),
        }
    }
}

/// Why a class map entry did not become a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    OutsideNamespace,
    TooShallow,
    NotMainClass,
    MissingFile,
    NotLoadable,
    Abstract,
    NotAPlugin,
    MissingMetadata,
    InvalidMetadata { message: String },
    NoPluginRoot,
    InstantiationFailed { message: String },
    /// Registered, then replaced by a later class declaring the same id
    Shadowed { id: String, by: String },
}

impl RejectionReason {
    /// Whether the rejection is worth telling a plugin author about
    pub fn is_warning(&self) -> bool {
        matches!(self,
            RejectionReason::MissingMetadata |
            RejectionReason::InvalidMetadata { .. } |
            RejectionReason::InstantiationFailed { .. } |
            RejectionReason::Shadowed { .. }
        )
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::OutsideNamespace => write!(f, "outside the plugin namespace"),
            RejectionReason::TooShallow => write!(f, "namespace too shallow for a plugin main class"),
            RejectionReason::NotMainClass => write!(f, "not a plugin main class"),
            RejectionReason::MissingFile => write!(f, "source file does not exist"),
            RejectionReason::NotLoadable => write!(f, "class is not declared"),
            RejectionReason::Abstract => write!(f, "class is abstract"),
            RejectionReason::NotAPlugin => write!(f, "class does not extend the plugin contract"),
            RejectionReason::MissingMetadata => write!(f, "no plugin metadata declared"),
            RejectionReason::InvalidMetadata { message } => write!(f, "invalid metadata: {}", message),
            RejectionReason::NoPluginRoot => write!(f, "source file is not inside a plugin directory"),
            RejectionReason::InstantiationFailed { message } => write!(f, "instantiation failed: {}", message),
            RejectionReason::Shadowed { id, by } => write!(f, "id '{}' taken over by {}", id, by),
        }
    }
}

/// A skipped class map entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub class: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub reason: RejectionReason,
}

/// A class that made it into the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredClass {
    pub id: String,
    pub class: String,
}

/// Structured result of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub registered: Vec<RegisteredClass>,
    pub rejections: Vec<Rejection>,
}

impl DiscoveryReport {
    pub fn is_registered(&self, id: &str) -> bool {
        self.registered.iter().any(|r| r.id == id)
    }

    /// Rejection recorded for a class, if any
    pub fn rejection_for(&self, class: &str) -> Option<&RejectionReason> {
        let wanted = ClassName::parse(class).to_string();
        self.rejections
            .iter()
            .find(|r| r.class == wanted)
            .map(|r| &r.reason)
    }

    pub fn warning_count(&self) -> usize {
        self.rejections.iter().filter(|r| r.reason.is_warning()).count()
    }
}

/// A plugin produced by discovery
#[derive(Clone)]
pub struct DiscoveredPlugin {
    pub id: String,
    pub class: ClassName,
    pub meta: PluginMeta,
    pub instance: Arc<dyn Plugin>,
    /// Main class source file
    pub source: PathBuf,
    pub root: PathBuf,
    pub paths: PluginPaths,
    /// Resources found on disk at registration time
    pub resources: ResourceKind,
}

impl fmt::Debug for DiscoveredPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveredPlugin")
            .field("id", &self.id)
            .field("class", &self.class.to_string())
            .field("root", &self.root)
            .field("resources", &self.resources)
            .finish()
    }
}

/// Output of a scan: plugins in first-seen id order plus the report
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub plugins: Vec<DiscoveredPlugin>,
    pub report: DiscoveryReport,
}

/// Scans a class map against a class table
pub struct PluginScanner<'a> {
    classes: &'a ClassTable,
    config: &'a LoaderConfig,
    namespace: ClassName,
}

impl<'a> PluginScanner<'a> {
    pub fn new(classes: &'a ClassTable, config: &'a LoaderConfig) -> Self {
        Self {
            classes,
            config,
            namespace: ClassName::parse(&config.namespace),
        }
    }

    /// Run every check over every entry
    pub fn scan(&self, map: &ClassMap) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in map.iter() {
            let class = ClassName::parse(&entry.class);

            let plugin = match self.examine(&class, &entry.path) {
                Ok(plugin) => plugin,
                Err(reason) => {
                    if reason.is_warning() {
                        warn!("Skipping plugin class {}: {}", class, reason);
                    } else {
                        debug!("Skipping class {}: {}", class, reason);
                    }
                    outcome.report.rejections.push(Rejection {
                        class: class.to_string(),
                        path: entry.path.clone(),
                        reason,
                    });
                    continue;
                }
            };

            debug!("Discovered plugin '{}' ({}) at {}", plugin.id, class, plugin.root.display());

            match index.get(&plugin.id) {
                Some(&slot) => {
                    let previous = std::mem::replace(&mut outcome.plugins[slot], plugin);
                    let current = &outcome.plugins[slot];
                    warn!(
                        "Plugin id '{}' declared by both {} and {}; keeping {}",
                        current.id, previous.class, current.class, current.class
                    );
                    outcome.report.registered.retain(|r| r.id != current.id);
                    outcome.report.rejections.push(Rejection {
                        class: previous.class.to_string(),
                        path: previous.source.clone(),
                        reason: RejectionReason::Shadowed {
                            id: current.id.clone(),
                            by: current.class.to_string(),
                        },
                    });
                    outcome.report.registered.push(RegisteredClass {
                        id: current.id.clone(),
                        class: current.class.to_string(),
                    });
                }
                None => {
                    index.insert(plugin.id.clone(), outcome.plugins.len());
                    outcome.report.registered.push(RegisteredClass {
                        id: plugin.id.clone(),
                        class: plugin.class.to_string(),
                    });
                    outcome.plugins.push(plugin);
                }
            }
        }

        outcome
    }

    fn examine(&self, class: &ClassName, file: &Path) -> Result<DiscoveredPlugin, RejectionReason> {
        if !class.starts_with(&self.namespace) {
            return Err(RejectionReason::OutsideNamespace);
        }

        // Main classes follow `<namespace>\<Name>\<Name>`
        let rest = &class.segments()[self.namespace.segments().len()..];
        if rest.len() < 2 {
            return Err(RejectionReason::TooShallow);
        }
        if rest.len() > 2 || rest[0] != rest[1] {
            return Err(RejectionReason::NotMainClass);
        }

        if !file.is_file() {
            return Err(RejectionReason::MissingFile);
        }
        let decl = self.classes.get(class).ok_or(RejectionReason::NotLoadable)?;

        if decl.is_abstract() {
            return Err(RejectionReason::Abstract);
        }
        if !decl.extends_plugin() {
            return Err(RejectionReason::NotAPlugin);
        }

        let meta = decl.meta.clone().ok_or(RejectionReason::MissingMetadata)?;
        meta.validate().map_err(|e| RejectionReason::InvalidMetadata { message: e.to_string() })?;

        // plugins/<name>/src/<Name>.php -> plugins/<name>
        let root = file
            .parent()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(RejectionReason::NoPluginRoot)?
            .to_path_buf();

        let instance: Arc<dyn Plugin> = decl
            .instantiate()
            .map_err(|e| RejectionReason::InstantiationFailed { message: e.to_string() })?
            .into();

        let paths = instance.paths(&root, &self.config.convention);
        let resources = paths.probe();

        Ok(DiscoveredPlugin {
            id: meta.id.clone(),
            class: class.clone(),
            meta,
            instance,
            source: file.to_path_buf(),
            root,
            paths,
            resources,
        })
    }
}
