//! Class Map and Class Declarations
//!
//! Discovery works from two inputs. The class map is produced by the build
//! step and says which class lives in which file. The class table is the
//! declarative side table that says what each class is: whether it is
//! abstract, whether it extends the plugin contract, which metadata it
//! declares and how to construct it.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use super::error::{PluginError, PluginResult};
use super::metadata::PluginMeta;
use super::traits::Plugin;

/// Builds one plugin instance
pub type PluginFactory = Arc<dyn Fn() -> PluginResult<Box<dyn Plugin>> + Send + Sync>;

/// Fully-qualified class name split into namespace segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName {
    segments: Vec<String>,
}

impl ClassName {
    /// Parse a class name; `\` and `::` both separate segments
    pub fn parse(name: &str) -> Self {
        let normalized = name.replace("::", "\\");
        let segments = normalized
            .split('\\')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment
    pub fn short_name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Whether this name lives inside `namespace`
    pub fn starts_with(&self, namespace: &ClassName) -> bool {
        self.segments.len() > namespace.segments.len()
            && self.segments.iter().zip(&namespace.segments).all(|(a, b)| a == b)
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("\\"))
    }
}

/// One class map row
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassMapEntry {
    pub class: String,
    pub path: PathBuf,
}

/// Class name to source file map, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
    entries: Vec<ClassMapEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassMapDocument {
    List(Vec<ClassMapEntry>),
    Table(std::collections::BTreeMap<String, PathBuf>),
}

impl ClassMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn insert<C: Into<String>, P: Into<PathBuf>>(&mut self, class: C, path: P) {
        self.entries.push(ClassMapEntry { class: class.into(), path: path.into() });
    }

    pub fn with<C: Into<String>, P: Into<PathBuf>>(mut self, class: C, path: P) -> Self {
        self.insert(class, path);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassMapEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse JSON: either a list of `{class, path}` rows (order kept) or an
    /// object of class to path (sorted by class name)
    pub fn from_json_str(content: &str) -> PluginResult<Self> {
        let document: ClassMapDocument = serde_json::from_str(content)?;
        Ok(Self::from_document(document))
    }

    /// Parse TOML: either `[[class]]` rows or a flat table of class to path
    pub fn from_toml_str(content: &str) -> PluginResult<Self> {
        #[derive(Deserialize)]
        struct Rows {
            class: Vec<ClassMapEntry>,
        }

        if let Ok(rows) = toml::from_str::<Rows>(content) {
            return Ok(Self { entries: rows.class });
        }
        let table: std::collections::BTreeMap<String, PathBuf> = toml::from_str(content)?;
        Ok(Self::from_document(ClassMapDocument::Table(table)))
    }

    /// Load from a `.json` or `.toml` file; relative paths resolve against the file's directory
    pub fn from_file(path: &Path) -> PluginResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PluginError::discovery_failed(format!("Failed to read class map {}: {}", path.display(), e))
        })?;

        let mut map = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            _ => Self::from_json_str(&content)?,
        };

        if let Some(base) = path.parent() {
            for entry in &mut map.entries {
                if entry.path.is_relative() {
                    entry.path = base.join(&entry.path);
                }
            }
        }
        Ok(map)
    }

    fn from_document(document: ClassMapDocument) -> Self {
        let entries = match document {
            ClassMapDocument::List(entries) => entries,
            ClassMapDocument::Table(table) => table
                .into_iter()
                .map(|(class, path)| ClassMapEntry { class, path })
                .collect(),
        };
        Self { entries }
    }
}

/// Supplies the class map discovery scans
pub trait ClassMapSource: Send + Sync {
    fn load_class_map(&self) -> PluginResult<ClassMap>;
}

impl ClassMapSource for ClassMap {
    fn load_class_map(&self) -> PluginResult<ClassMap> {
        Ok(self.clone())
    }
}

/// Class map read from disk on every scan
#[derive(Debug, Clone)]
pub struct ClassMapFile(pub PathBuf);

impl ClassMapSource for ClassMapFile {
    fn load_class_map(&self) -> PluginResult<ClassMap> {
        ClassMap::from_file(&self.0)
    }
}

/// Whether a class can be instantiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Concrete,
    Abstract,
}

/// What a class extends, as far as discovery cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassBase {
    Plugin,
    Other,
}

/// Declaration of one class
#[derive(Clone)]
pub struct ClassDecl {
    pub kind: ClassKind,
    pub base: ClassBase,
    pub meta: Option<PluginMeta>,
    pub factory: Option<PluginFactory>,
}

impl ClassDecl {
    /// A concrete plugin main class with metadata
    pub fn plugin<P, F>(meta: PluginMeta, factory: F) -> Self
    where
        P: Plugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        Self {
            kind: ClassKind::Concrete,
            base: ClassBase::Plugin,
            meta: Some(meta),
            factory: Some(Arc::new(move || Ok(Box::new(factory()) as Box<dyn Plugin>))),
        }
    }

    /// A concrete plugin whose construction can fail
    pub fn fallible_plugin<F>(meta: PluginMeta, factory: F) -> Self
    where
        F: Fn() -> PluginResult<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        Self {
            kind: ClassKind::Concrete,
            base: ClassBase::Plugin,
            meta: Some(meta),
            factory: Some(Arc::new(factory)),
        }
    }

    /// A plugin class that forgot its metadata declaration
    pub fn undeclared_plugin<P, F>(factory: F) -> Self
    where
        P: Plugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        Self {
            meta: None,
            ..Self::plugin(PluginMeta::new("", "", ""), factory)
        }
    }

    /// An abstract plugin base class
    pub fn abstract_plugin(meta: Option<PluginMeta>) -> Self {
        Self {
            kind: ClassKind::Abstract,
            base: ClassBase::Plugin,
            meta,
            factory: None,
        }
    }

    /// Any class that does not extend the plugin contract
    pub fn other() -> Self {
        Self {
            kind: ClassKind::Concrete,
            base: ClassBase::Other,
            meta: None,
            factory: None,
        }
    }

    pub fn is_abstract(&self) -> bool {
        self.kind == ClassKind::Abstract
    }

    pub fn extends_plugin(&self) -> bool {
        self.base == ClassBase::Plugin
    }

    /// Build an instance
    pub fn instantiate(&self) -> PluginResult<Box<dyn Plugin>> {
        match &self.factory {
            Some(factory) => factory(),
            None => Err(PluginError::loading_failed("class has no constructor")),
        }
    }
}

impl fmt::Debug for ClassDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDecl")
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("meta", &self.meta.as_ref().map(|m| &m.id))
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// Declarations by class name
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: HashMap<ClassName, ClassDecl>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class; a later declaration for the same name replaces the earlier one
    pub fn declare(&mut self, class: &str, decl: ClassDecl) {
        self.classes.insert(ClassName::parse(class), decl);
    }

    pub fn with(mut self, class: &str, decl: ClassDecl) -> Self {
        self.declare(class, decl);
        self
    }

    /// Add every declaration from `other`
    pub fn extend(&mut self, other: ClassTable) {
        self.classes.extend(other.classes);
    }

    pub fn get(&self, class: &ClassName) -> Option<&ClassDecl> {
        self.classes.get(class)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
