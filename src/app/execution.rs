//! Command execution

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

use crate::cli::output::{self, format_compact_table};
use crate::cli::{Args, Command};
use crate::config::ConfigManager;
use crate::events::EventBus;
use crate::plugin::{ConfigField, PluginError, PluginMap, PluginMeta, PluginPaths, PluginRegistry, ResourceKind};

use super::initialization::enabled_plugins;

/// Run the selected subcommand and print its output
pub fn run_command(args: &Args, config: &ConfigManager, registry: &PluginRegistry) -> Result<()> {
    let rendered = render_command(args, config, registry)?;
    print!("{}", rendered.output);
    match rendered.failure {
        Some(message) => Err(anyhow::anyhow!(message)),
        None => Ok(()),
    }
}

/// Command output plus an optional failure to report after printing
#[derive(Debug, Default)]
pub struct Rendered {
    pub output: String,
    pub failure: Option<String>,
}

impl From<String> for Rendered {
    fn from(output: String) -> Self {
        Self { output, failure: None }
    }
}

pub fn render_command(args: &Args, config: &ConfigManager, registry: &PluginRegistry) -> Result<Rendered> {
    match &args.command {
        Command::Discover => render_discover(registry, args.json).map(Rendered::from),
        Command::List => render_list(registry, args.json).map(Rendered::from),
        Command::Info { id } => render_info(registry, id, args.json).map(Rendered::from),
        Command::Resources => render_resources(registry, args.json).map(Rendered::from),
        Command::Permissions => render_permissions(registry, args.json).map(Rendered::from),
        Command::Boot { plugins, ordered } => render_boot(registry, config, plugins, *ordered, args.json),
        Command::Order { plugins } => {
            let enabled = enabled_plugins(plugins, config, registry);
            render_order(registry, &enabled, args.json).map(Rendered::from)
        }
    }
}

fn render_discover(registry: &PluginRegistry, json: bool) -> Result<String> {
    let report = registry.discover();
    if json {
        return output::to_json(&report).map(|s| s + "\n");
    }

    let mut out = String::new();
    writeln!(out, "{}", output::heading(&format!("Registered plugins ({})", report.registered.len())))?;
    let rows: Vec<Vec<String>> = report
        .registered
        .iter()
        .map(|r| vec![r.id.clone(), r.class.clone()])
        .collect();
    out.push_str(&format_compact_table(&["ID", "CLASS"], &rows));

    if !report.rejections.is_empty() {
        writeln!(out, "{}", output::heading(&format!("Skipped classes ({})", report.rejections.len())))?;
        let rows: Vec<Vec<String>> = report
            .rejections
            .iter()
            .map(|r| {
                let reason = r.reason.to_string();
                let reason = if r.reason.is_warning() {
                    output::warning(&reason).to_string()
                } else {
                    output::muted(&reason).to_string()
                };
                vec![r.class.clone(), reason]
            })
            .collect();
        out.push_str(&format_compact_table(&["CLASS", "REASON"], &rows));
    }
    Ok(out)
}

fn resource_labels(kinds: ResourceKind) -> Vec<&'static str> {
    kinds.iter().map(ResourceKind::label).collect()
}

fn render_list(registry: &PluginRegistry, json: bool) -> Result<String> {
    let metas = registry.plugins_meta();
    if json {
        let list: Vec<&PluginMeta> = metas.values().collect();
        return output::to_json(&list).map(|s| s + "\n");
    }
    if metas.is_empty() {
        return Ok(format!("{}\n", output::muted("No plugins discovered")));
    }

    let rows: Vec<Vec<String>> = metas
        .values()
        .map(|meta| {
            let resources = registry
                .plugin(&meta.id)
                .map(|p| resource_labels(p.resources).join(","))
                .unwrap_or_default();
            vec![meta.id.clone(), meta.name.clone(), meta.version.clone(), resources]
        })
        .collect();
    Ok(format_compact_table(&["ID", "NAME", "VERSION", "RESOURCES"], &rows))
}

#[derive(Serialize)]
struct PluginInfo {
    #[serde(flatten)]
    meta: PluginMeta,
    class: String,
    root: PathBuf,
    paths: PluginPaths,
    resources: Vec<&'static str>,
    config_fields: Vec<ConfigField>,
}

fn render_info(registry: &PluginRegistry, id: &str, json: bool) -> Result<String> {
    let plugin = registry
        .plugin(id)
        .ok_or_else(|| PluginError::plugin_not_found(id))?;

    let info = PluginInfo {
        meta: plugin.meta.clone(),
        class: plugin.class.to_string(),
        root: plugin.root.clone(),
        paths: plugin.paths.clone(),
        resources: resource_labels(plugin.resources),
        config_fields: plugin.instance.config_fields(),
    };
    if json {
        return output::to_json(&info).map(|s| s + "\n");
    }

    let mut out = String::new();
    writeln!(out, "{} {}", output::heading(&info.meta.name), info.meta.version)?;
    if !info.meta.description.is_empty() {
        writeln!(out, "  {}", info.meta.description)?;
    }
    let mut rows = vec![
        vec!["id".to_string(), info.meta.id.clone()],
        vec!["class".to_string(), info.class.clone()],
        vec!["root".to_string(), info.root.display().to_string()],
    ];
    if !info.meta.author.is_empty() {
        rows.push(vec!["author".to_string(), info.meta.author.clone()]);
    }
    for (dependency, constraint) in &info.meta.dependencies {
        rows.push(vec!["requires".to_string(), format!("{} {}", dependency, constraint)]);
    }
    for kind in ResourceKind::all().iter() {
        if let Some(path) = info.paths.get(kind) {
            let state = if plugin.resources.contains(kind) { "" } else { " (missing)" };
            rows.push(vec![kind.label().to_string(), format!("{}{}", path.display(), state)]);
        }
    }
    out.push_str(&format_compact_table(&["FIELD", "VALUE"], &rows));

    if !info.config_fields.is_empty() {
        writeln!(out, "{}", output::heading("Settings"))?;
        let rows: Vec<Vec<String>> = info
            .config_fields
            .iter()
            .map(|f| {
                let field_type = serde_json::to_value(f.field_type)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                vec![f.name.clone(), f.label.clone(), field_type, f.default.to_string()]
            })
            .collect();
        out.push_str(&format_compact_table(&["NAME", "LABEL", "TYPE", "DEFAULT"], &rows));
    }
    Ok(out)
}

fn render_resources(registry: &PluginRegistry, json: bool) -> Result<String> {
    let maps: BTreeMap<&str, PluginMap<PathBuf>> = BTreeMap::from([
        ("routes", registry.routes_files()),
        ("admin_routes", registry.admin_routes_files()),
        ("migrations", registry.migration_paths()),
        ("views", registry.view_paths()),
        ("lang", registry.lang_paths()),
    ]);
    if json {
        return output::to_json(&maps).map(|s| s + "\n");
    }

    let rows: Vec<Vec<String>> = maps
        .iter()
        .flat_map(|(kind, paths)| {
            paths
                .iter()
                .map(move |(id, path)| vec![id.clone(), kind.to_string(), path.display().to_string()])
        })
        .collect();
    if rows.is_empty() {
        return Ok(format!("{}\n", output::muted("No plugin resources found")));
    }
    Ok(format_compact_table(&["PLUGIN", "RESOURCE", "PATH"], &rows))
}

fn render_permissions(registry: &PluginRegistry, json: bool) -> Result<String> {
    let permissions = registry.declared_permissions();
    if json {
        return output::to_json(&permissions).map(|s| s + "\n");
    }

    let rows: Vec<Vec<String>> = permissions
        .iter()
        .flat_map(|(id, keys)| keys.iter().map(move |key| vec![id.clone(), key.clone()]))
        .collect();
    if rows.is_empty() {
        return Ok(format!("{}\n", output::muted("No permissions declared")));
    }
    Ok(format_compact_table(&["PLUGIN", "PERMISSION"], &rows))
}

fn render_boot(
    registry: &PluginRegistry,
    config: &ConfigManager,
    requested: &[String],
    ordered: bool,
    json: bool,
) -> Result<Rendered> {
    let mut enabled = enabled_plugins(requested, config, registry);
    if ordered {
        enabled = registry.boot_order(&enabled).context("Cannot order plugins for boot")?;
    }

    let bus = EventBus::new();
    let report = registry.boot_plugins(&enabled, &bus);
    info!("Boot finished: {} booted, {} failed", report.booted.len(), report.failed.len());

    let failure = (!report.failed.is_empty())
        .then(|| format!("{} plugin(s) failed to boot", report.failed.len()));

    if json {
        return Ok(Rendered {
            output: output::to_json(&report)? + "\n",
            failure,
        });
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for id in &report.booted {
        rows.push(vec![id.clone(), output::success("booted").to_string(), String::new()]);
    }
    for failed in &report.failed {
        rows.push(vec![failed.id.clone(), output::failure("failed").to_string(), failed.error.clone()]);
    }
    for id in &report.unknown {
        rows.push(vec![id.clone(), output::warning("unknown").to_string(), String::new()]);
    }
    for id in &report.skipped {
        rows.push(vec![id.clone(), output::muted("skipped").to_string(), String::new()]);
    }

    let mut out = format_compact_table(&["PLUGIN", "STATUS", "DETAIL"], &rows);
    if rows.is_empty() {
        writeln!(out, "{}", output::muted("No plugins enabled"))?;
    }
    for issue in &report.dependency_issues {
        writeln!(out, "{} {}", output::warning("dependency:"), issue)?;
    }
    Ok(Rendered { output: out, failure })
}

fn render_order(registry: &PluginRegistry, enabled: &[String], json: bool) -> Result<String> {
    let order = registry.boot_order(enabled)?;
    if json {
        return output::to_json(&order).map(|s| s + "\n");
    }
    let mut out = String::new();
    for (position, id) in order.iter().enumerate() {
        writeln!(out, "{:>3}. {}", position + 1, id)?;
    }
    Ok(out)
}
