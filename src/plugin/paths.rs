//! Plugin Resource Paths
//!
//! Where a plugin keeps its routes, migrations, views and translations, and
//! which of those actually exist on disk.

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Resources a plugin provides
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ResourceKind: u8 {
        const ROUTES       = 0b0000_0001;
        const ADMIN_ROUTES = 0b0000_0010;
        const MIGRATIONS   = 0b0000_0100;
        const VIEWS        = 0b0000_1000;
        const LANG         = 0b0001_0000;
    }
}

impl ResourceKind {
    /// Short label used in listings
    pub fn label(self) -> &'static str {
        if self == ResourceKind::ROUTES {
            "routes"
        } else if self == ResourceKind::ADMIN_ROUTES {
            "admin-routes"
        } else if self == ResourceKind::MIGRATIONS {
            "migrations"
        } else if self == ResourceKind::VIEWS {
            "views"
        } else if self == ResourceKind::LANG {
            "lang"
        } else {
            "mixed"
        }
    }
}

/// Layout of resources relative to a plugin's root directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConvention {
    pub routes: PathBuf,
    pub admin_routes: PathBuf,
    pub migrations: PathBuf,
    pub views: PathBuf,
    pub lang: PathBuf,
}

impl Default for PathConvention {
    fn default() -> Self {
        Self {
            routes: PathBuf::from("routes/web.php"),
            admin_routes: PathBuf::from("routes/admin.php"),
            migrations: PathBuf::from("database/migrations"),
            views: PathBuf::from("resources/views"),
            lang: PathBuf::from("resources/lang"),
        }
    }
}

impl PathConvention {
    /// Apply the convention to a plugin root
    pub fn resolve(&self, root: &Path) -> PluginPaths {
        PluginPaths {
            routes: root.join(&self.routes),
            admin_routes: root.join(&self.admin_routes),
            migrations: root.join(&self.migrations),
            views: root.join(&self.views),
            lang: root.join(&self.lang),
        }
    }
}

/// Absolute resource paths for one plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginPaths {
    pub routes: PathBuf,
    pub admin_routes: PathBuf,
    pub migrations: PathBuf,
    pub views: PathBuf,
    pub lang: PathBuf,
}

impl PluginPaths {
    /// Path for a single resource kind
    pub fn get(&self, kind: ResourceKind) -> Option<&Path> {
        let path = if kind == ResourceKind::ROUTES {
            &self.routes
        } else if kind == ResourceKind::ADMIN_ROUTES {
            &self.admin_routes
        } else if kind == ResourceKind::MIGRATIONS {
            &self.migrations
        } else if kind == ResourceKind::VIEWS {
            &self.views
        } else if kind == ResourceKind::LANG {
            &self.lang
        } else {
            return None;
        };
        Some(path.as_path())
    }

    /// Check which resources exist on disk
    pub fn probe(&self) -> ResourceKind {
        ResourceKind::all()
            .iter()
            .filter(|kind| self.get(*kind).map(Path::exists).unwrap_or(false))
            .fold(ResourceKind::empty(), |acc, kind| acc | kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_convention() {
        let paths = PathConvention::default().resolve(Path::new("/srv/plugins/blog"));
        assert_eq!(paths.routes, PathBuf::from("/srv/plugins/blog/routes/web.php"));
        assert_eq!(paths.admin_routes, PathBuf::from("/srv/plugins/blog/routes/admin.php"));
        assert_eq!(paths.migrations, PathBuf::from("/srv/plugins/blog/database/migrations"));
        assert_eq!(paths.views, PathBuf::from("/srv/plugins/blog/resources/views"));
        assert_eq!(paths.lang, PathBuf::from("/srv/plugins/blog/resources/lang"));
    }

    #[test]
    fn test_probe_reports_existing_resources() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("routes")).unwrap();
        fs::write(root.join("routes/web.php"), "<?php").unwrap();
        fs::create_dir_all(root.join("resources/views")).unwrap();

        let found = PathConvention::default().resolve(root).probe();
        assert_eq!(found, ResourceKind::ROUTES | ResourceKind::VIEWS);
        assert!(!found.contains(ResourceKind::ADMIN_ROUTES));
    }

    #[test]
    fn test_probe_empty_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(PathConvention::default().resolve(temp_dir.path()).probe().is_empty());
    }

    #[test]
    fn test_labels() {
        assert_eq!(ResourceKind::LANG.label(), "lang");
        assert_eq!((ResourceKind::LANG | ResourceKind::VIEWS).label(), "mixed");
    }
}
