//! Application initialization and configuration

use anyhow::Result;
use std::path::PathBuf;
use std::str::FromStr;
use log::{debug, LevelFilter};
use crate::{cli, config, logging};
use crate::plugin::{builtin, ClassMapFile, ClassMapSource, PluginRegistry};

/// Bundled plugins directory when neither CLI nor config names one
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    let mut manager = if let Some(config_file) = &args.config_file {
        debug!("Loading configuration from explicit file: {}", config_file.display());
        config::ConfigManager::load_from_file(config_file.clone())?
    } else {
        config::ConfigManager::load()?
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    match manager.config_file_path() {
        Some(path) => debug!("Using configuration from {}", path.display()),
        None => debug!("Using built-in defaults, no configuration file"),
    }

    Ok(manager)
}

/// Coloured output unless `--no-color` or `[base] color = false`
pub fn colours_enabled(args: &cli::Args, config: &config::ConfigManager) -> Result<bool> {
    if args.no_color {
        return Ok(false);
    }
    Ok(config.get_bool("base", "color")?.unwrap_or(true))
}

pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        config.get_log_level("base", "console-level")?.unwrap_or(LevelFilter::Warn)
    };

    let format = match args.log_format.as_deref().or(config.get_value("base", "log-format").map(String::as_str)) {
        Some(format) => logging::LogFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?,
        None => logging::LogFormat::Text,
    };

    let log_file_path = args.log_file.clone()
        .or_else(|| config.get_path("base", "log-file"));

    let file_log_level = match &args.log_file_level {
        Some(level_str) => Some(logging::parse_log_level(level_str)?),
        None => config.get_log_level("base", "file-level")?,
    };

    let (destination, file_level) = match log_file_path {
        Some(file_path) => {
            let level = file_log_level.unwrap_or(console_level);
            debug!("File logging enabled: {} (level: {:?})", file_path.display(), level);
            (logging::LogDestination::Both(file_path), Some(level))
        }
        None => (logging::LogDestination::Console, None),
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Build the registry from CLI flags, then config, then the bundled layout
pub fn build_registry(args: &cli::Args, config: &config::ConfigManager) -> Result<PluginRegistry> {
    let mut loader = config.get_loader_config()?;
    if let Some(namespace) = &args.namespace {
        loader.namespace = namespace.trim_matches('\\').to_string();
    }

    let classmap = args.classmap.clone().or_else(|| {
        // A plugins directory on the command line beats a configured class map
        if args.plugins_dir.is_some() {
            None
        } else {
            config.get_classmap_path()
        }
    });

    let source: Box<dyn ClassMapSource> = match classmap {
        Some(path) => {
            debug!("Discovering plugins from class map {}", path.display());
            Box::new(ClassMapFile(path))
        }
        None => {
            let dir = args.plugins_dir.clone()
                .or_else(|| config.get_plugins_dir())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PLUGINS_DIR));
            debug!("Discovering bundled plugins under {}", dir.display());
            Box::new(builtin::class_map(&dir))
        }
    };

    Ok(PluginRegistry::new(source, builtin::class_table(), loader))
}

/// Ids to boot: explicit list, then `[plugins] enabled`, then every discovered plugin
pub fn enabled_plugins(requested: &[String], config: &config::ConfigManager, registry: &PluginRegistry) -> Vec<String> {
    if !requested.is_empty() {
        return requested.to_vec();
    }
    if let Some(enabled) = config.get_enabled_plugins() {
        return enabled;
    }
    registry.plugins_meta().into_keys().collect()
}
