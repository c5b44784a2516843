//! Boot Dispatcher Tests

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;

use super::mock_plugins::{plugin_tree, plugin_tree_with_meta, SpyPlugin};
use crate::events::EventBus;
use crate::plugin::compatibility::{DependencyChecker, DependencyIssue};
use crate::plugin::discovery::LoaderConfig;
use crate::plugin::error::PluginError;
use crate::plugin::metadata::PluginMeta;
use crate::plugin::registry::{BootFailure, PluginRegistry};

fn registry_with(temp_dir: &TempDir, plugins: &[(&str, SpyPlugin)]) -> PluginRegistry {
    let (map, classes) = plugin_tree(temp_dir.path(), plugins);
    PluginRegistry::new(Box::new(map), classes, LoaderConfig::default())
}

#[test]
fn test_boots_only_enabled_plugins_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let blog = SpyPlugin::new();
    let shop = SpyPlugin::new();
    let votes = SpyPlugin::new();
    let registry = registry_with(&temp_dir, &[("blog", blog.clone()), ("shop", shop.clone()), ("votes", votes.clone())]);

    let report = registry.boot_plugins(&["votes", "blog"], &EventBus::new());

    assert_eq!(report.booted, vec!["votes", "blog"]);
    assert_eq!(blog.boot_count(), 1);
    assert_eq!(votes.boot_count(), 1);
    assert_eq!(shop.boot_count(), 0);
    assert!(report.is_clean());
    assert!(registry.is_booted("votes"));
    assert!(!registry.is_booted("shop"));
}

#[test]
fn test_unknown_ids_are_reported() {
    let temp_dir = TempDir::new().unwrap();
    let blog = SpyPlugin::new();
    let registry = registry_with(&temp_dir, &[("blog", blog.clone())]);

    let report = registry.boot_plugins(&["ghost", "blog"], &EventBus::new());
    assert_eq!(report.unknown, vec!["ghost"]);
    assert_eq!(report.booted, vec!["blog"]);
    assert!(!report.is_clean());
}

#[test]
fn test_boot_once_per_load_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let blog = SpyPlugin::new();
    let registry = registry_with(&temp_dir, &[("blog", blog.clone())]);
    let bus = EventBus::new();

    registry.boot_plugins(&["blog", "blog"], &bus);
    let report = registry.boot_plugins(&["blog"], &bus);
    assert_eq!(blog.boot_count(), 1);
    assert_eq!(report.skipped, vec!["blog"]);

    registry.clear_cache();
    registry.boot_plugins(&["blog"], &bus);
    assert_eq!(blog.boot_count(), 2);
}

#[test]
fn test_failing_boot_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let blog = SpyPlugin::new();
    let shop = SpyPlugin::failing();
    let docs = SpyPlugin::new();
    let registry = registry_with(&temp_dir, &[("blog", blog.clone()), ("shop", shop), ("docs", docs.clone())]);

    let report = registry.boot_plugins(&["blog", "shop", "docs"], &EventBus::new());

    assert_eq!(report.booted, vec!["blog", "docs"]);
    assert_eq!(report.failed.len(), 1);
    let BootFailure { id, error } = &report.failed[0];
    assert_eq!(id, "shop");
    assert!(error.contains("refused to boot"));
    assert_eq!(docs.boot_count(), 1);
}

#[test]
fn test_boot_context_carries_bus() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry_with(&temp_dir, &[("notifications", SpyPlugin::publishing("plugin.booted"))]);

    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    bus.listen("plugin.booted", move |_event, payload: &Value| {
        captured.lock().push(payload["plugin"].as_str().unwrap_or_default().to_string());
        Ok(())
    }, 0);

    registry.boot_plugins(&["notifications"], &bus);
    assert_eq!(seen.lock().as_slice(), &["notifications".to_string()]);
}

#[test]
fn test_empty_enabled_list_boots_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let blog = SpyPlugin::new();
    let registry = registry_with(&temp_dir, &[("blog", blog.clone())]);

    let enabled: [&str; 0] = [];
    let report = registry.boot_plugins(&enabled, &EventBus::new());
    assert!(report.booted.is_empty());
    assert_eq!(blog.boot_count(), 0);
}

#[test]
fn test_dependency_issues_are_advisory() {
    let temp_dir = TempDir::new().unwrap();
    let shop = SpyPlugin::new();
    let (map, classes) = plugin_tree_with_meta(temp_dir.path(), vec![
        (PluginMeta::new("shop", "Shop", "1.0.0").with_dependency("votes", "^2.0"), shop.clone()),
        (PluginMeta::new("votes", "Votes", "1.4.0"), SpyPlugin::new()),
    ]);
    let registry = PluginRegistry::new(Box::new(map), classes, LoaderConfig::default());

    let report = registry.boot_plugins(&["shop", "votes"], &EventBus::new());
    assert_eq!(report.booted, vec!["shop", "votes"]);
    assert_eq!(report.dependency_issues.len(), 1);
    assert!(matches!(
        &report.dependency_issues[0],
        DependencyIssue::VersionMismatch { dependency, found, .. } if dependency == "votes" && found == "1.4.0"
    ));
}

#[test]
fn test_disabled_dependency_is_missing() {
    let temp_dir = TempDir::new().unwrap();
    let (map, classes) = plugin_tree_with_meta(temp_dir.path(), vec![
        (PluginMeta::new("shop", "Shop", "1.0.0").with_dependency("votes", "*"), SpyPlugin::new()),
        (PluginMeta::new("votes", "Votes", "1.4.0"), SpyPlugin::new()),
    ]);
    let registry = PluginRegistry::new(Box::new(map), classes, LoaderConfig::default());

    let report = registry.boot_plugins(&["shop"], &EventBus::new());
    assert!(matches!(&report.dependency_issues[0], DependencyIssue::Missing { .. }));
}

#[test]
fn test_core_constraint_uses_checker_version() {
    let temp_dir = TempDir::new().unwrap();
    let (map, classes) = plugin_tree_with_meta(temp_dir.path(), vec![
        (PluginMeta::new("blog", "Blog", "1.0.0").with_dependency("core", ">=2.0"), SpyPlugin::new()),
    ]);
    let registry = PluginRegistry::new(Box::new(map), classes, LoaderConfig::default())
        .with_checker(DependencyChecker::new("2.3.0"));

    assert!(registry.boot_plugins(&["blog"], &EventBus::new()).dependency_issues.is_empty());
}

#[test]
fn test_boot_order_puts_dependencies_first() {
    let temp_dir = TempDir::new().unwrap();
    let (map, classes) = plugin_tree_with_meta(temp_dir.path(), vec![
        (PluginMeta::new("shop", "Shop", "1.0.0").with_dependency("votes", "*"), SpyPlugin::new()),
        (PluginMeta::new("votes", "Votes", "1.0.0"), SpyPlugin::new()),
        (PluginMeta::new("blog", "Blog", "1.0.0"), SpyPlugin::new()),
    ]);
    let registry = PluginRegistry::new(Box::new(map), classes, LoaderConfig::default());

    assert_eq!(registry.boot_order(&["blog", "shop", "votes"]).unwrap(), vec!["blog", "votes", "shop"]);
}

#[test]
fn test_boot_order_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let (map, classes) = plugin_tree_with_meta(temp_dir.path(), vec![
        (PluginMeta::new("a", "A", "1.0.0").with_dependency("b", "*"), SpyPlugin::new()),
        (PluginMeta::new("b", "B", "1.0.0").with_dependency("a", "*"), SpyPlugin::new()),
    ]);
    let registry = PluginRegistry::new(Box::new(map), classes, LoaderConfig::default());

    assert!(matches!(registry.boot_order(&["a", "b"]), Err(PluginError::DependencyError { .. })));
}
