//! End-to-end plugin lifecycle
//!
//! Builds a plugin tree on disk, discovers it through a class map file, boots
//! the enabled plugins and checks they can talk over the event bus.

use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;

use gamecms::events::{EventBus, ListenerCatalog, ListenerResult, PLUGIN_BOOTED};
use gamecms::plugin::builtin;
use gamecms::plugin::{
    BootContext, ClassDecl, ClassMapFile, LoaderConfig, Plugin, PluginMeta, PluginRegistry,
    PluginResult, RejectionReason,
};

/// Third-party plugin that announces itself once booted
struct Forum;

impl Plugin for Forum {
    fn boot(&self, ctx: &BootContext<'_>) -> PluginResult<()> {
        ctx.events.dispatch("forum.ready", &json!({ "views": ctx.paths.views }));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn touch(path: PathBuf) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "<?php\n").unwrap();
    path
}

/// Lay out shop, votes and forum under `plugins/`, plus a class map referencing them
fn install(base: &Path) -> PathBuf {
    let plugins = base.join("plugins");
    touch(plugins.join("shop/src/Shop.php"));
    touch(plugins.join("shop/routes/web.php"));
    touch(plugins.join("votes/src/Votes.php"));
    touch(plugins.join("forum/src/Forum.php"));
    fs::create_dir_all(plugins.join("forum/resources/views")).unwrap();
    fs::write(plugins.join("forum/plugin.json"), r#"{"events": ["user.registered"]}"#).unwrap();

    let classmap = base.join("classmap.toml");
    fs::write(
        &classmap,
        r#"
[[class]]
class = "Plugins\\Shop\\Shop"
path = "plugins/shop/src/Shop.php"

[[class]]
class = "Plugins\\Votes\\Votes"
path = "plugins/votes/src/Votes.php"

[[class]]
class = "Plugins\\Forum\\Forum"
path = "plugins/forum/src/Forum.php"

[[class]]
class = "Plugins\\Forum\\Http\\TopicController"
path = "plugins/forum/src/Http/TopicController.php"
"#,
    )
    .unwrap();
    classmap
}

fn registry(classmap: PathBuf) -> PluginRegistry {
    let mut classes = builtin::class_table();
    classes.declare(
        "Plugins\\Forum\\Forum",
        ClassDecl::plugin(
            PluginMeta::new("forum", "Forum", "0.3.0").with_dependency("votes", "*"),
            || Forum,
        ),
    );
    PluginRegistry::new(Box::new(ClassMapFile(classmap)), classes, LoaderConfig::default())
}

fn record(bus: &EventBus, event: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.listen(
        event,
        move |_event: &str, payload: &Value| -> ListenerResult {
            sink.lock().push(payload.clone());
            Ok(())
        },
        0,
    );
    seen
}

#[test]
fn test_discovery_from_class_map_file() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(install(temp_dir.path()));

    let report = registry.discover();
    assert_eq!(registry.plugin_count(), 3);
    assert!(report.is_registered("forum"));
    assert_eq!(
        report.rejection_for("Plugins\\Forum\\Http\\TopicController"),
        Some(&RejectionReason::NotMainClass)
    );

    let routes = registry.routes_files();
    assert_eq!(routes.len(), 1);
    assert!(routes["shop"].ends_with("routes/web.php"));
    assert!(registry.view_paths().contains_key("forum"));
    assert_eq!(
        registry.plugin_paths("forum").unwrap().views,
        temp_dir.path().join("plugins/forum/resources/views")
    );
}

#[test]
fn test_boot_in_dependency_order_with_events() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(install(temp_dir.path()));
    let bus = EventBus::new();
    let booted = record(&bus, PLUGIN_BOOTED);
    let ready = record(&bus, "forum.ready");

    let order = registry.boot_order(&["forum", "votes", "shop"]).unwrap();
    assert_eq!(order, vec!["shop", "votes", "forum"]);

    let report = registry.boot_plugins(&order, &bus);
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(report.booted, order);

    let booted: Vec<Value> = booted.lock().iter().map(|p| p["plugin"].clone()).collect();
    assert_eq!(booted, vec![json!("shop"), json!("votes")]);
    assert_eq!(ready.lock().len(), 1);

    // A second boot in the same cycle is a no-op
    let again = registry.boot_plugins(&order, &bus);
    assert!(again.booted.is_empty());
    assert_eq!(again.skipped, order);
}

#[test]
fn test_disabled_dependency_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(install(temp_dir.path()));

    let report = registry.boot_plugins(&["forum"], &EventBus::new());
    assert_eq!(report.booted, vec!["forum"]);
    assert_eq!(report.dependency_issues.len(), 1);
}

#[test]
fn test_manifest_listeners_are_wired() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(install(temp_dir.path()));
    let bus = EventBus::new();
    let greeted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&greeted);

    let catalog = ListenerCatalog::new().with(
        "Plugins\\Forum\\Listeners\\UserRegisteredListener",
        move || {
            let sink = Arc::clone(&sink);
            move |_event: &str, payload: &Value| -> ListenerResult {
                sink.lock().push(payload["name"].clone());
                Ok(())
            }
        },
    );

    assert_eq!(registry.register_listeners("forum", &bus, &catalog).unwrap(), 1);
    bus.dispatch("user.registered", &json!({ "name": "steve" }));
    assert_eq!(*greeted.lock(), vec![json!("steve")]);
}

#[test]
fn test_class_map_changes_need_clear_cache() {
    let temp_dir = TempDir::new().unwrap();
    let classmap = install(temp_dir.path());
    let registry = registry(classmap.clone());
    assert_eq!(registry.plugin_count(), 3);

    fs::write(&classmap, "").unwrap();
    assert_eq!(registry.plugin_count(), 3);

    registry.clear_cache();
    assert_eq!(registry.plugin_count(), 0);
}
