use clap::{Parser, Subcommand};
use anyhow::Result;
use std::path::PathBuf;
use log::debug;

/// Plugin core for game-server community sites
#[derive(Parser, Debug)]
#[command(name = "gamecms")]
#[command(about = "Discover, inspect and boot gamecms plugins")]
#[command(version)]
pub struct Args {
    /// Verbose output (debug level logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Log file path for file output
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION", global = true)]
    pub config_name: Option<String>,

    /// Class map file (.json or .toml) to discover plugins from
    #[arg(long, value_name = "FILE", global = true)]
    pub classmap: Option<PathBuf>,

    /// Directory holding the bundled plugins when no class map is given
    #[arg(long, value_name = "DIR", global = true)]
    pub plugins_dir: Option<PathBuf>,

    /// Plugin namespace prefix
    #[arg(long, value_name = "NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan the class map and report every accepted and rejected class
    Discover,

    /// List discovered plugins
    List,

    /// Show metadata, paths and settings of one plugin
    Info {
        /// Plugin id
        id: String,
    },

    /// Show which plugins provide routes, migrations, views and translations
    Resources,

    /// Show the permission keys each plugin declares
    Permissions,

    /// Boot plugins (configured `enabled` list when none are given)
    Boot {
        /// Plugin ids in boot order; comma-separated values are accepted
        #[arg(value_name = "PLUGIN")]
        plugins: Vec<String>,

        /// Reorder so dependencies boot first
        #[arg(long)]
        ordered: bool,
    },

    /// Print the dependency-respecting boot order
    Order {
        /// Plugin ids; comma-separated values are accepted
        #[arg(value_name = "PLUGIN")]
        plugins: Vec<String>,
    },
}

impl Command {
    /// Split comma-separated plugin lists
    pub fn normalize(self) -> Self {
        match self {
            Command::Boot { plugins, ordered } => Command::Boot { plugins: split_plugins(plugins), ordered },
            Command::Order { plugins } => Command::Order { plugins: split_plugins(plugins) },
            other => other,
        }
    }
}

fn split_plugins(values: Vec<String>) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let mut args = Args::parse();
    args.command = args.command.normalize();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    if let Some(format) = &args.log_format {
        match format.to_lowercase().as_str() {
            "text" | "json" => {},
            _ => return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Valid options: text, json", format
            )),
        }
    }

    if let Some(level) = &args.log_file_level {
        match level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {},
            _ => return Err(anyhow::anyhow!(
                "Invalid log file level '{}'. Valid levels: error, warn, info, debug, trace", level
            )),
        }
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!(
            "--log-file-level requires --log-file to be specified"
        ));
    }

    if args.classmap.is_some() && args.plugins_dir.is_some() {
        return Err(anyhow::anyhow!(
            "--classmap and --plugins-dir are mutually exclusive"
        ));
    }

    Ok(())
}
