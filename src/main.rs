use anyhow::Result;
use gamecms::{app, cli, logging};
use log::error;
use std::process;

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {:?}", panic_info);
        eprintln!("Panic: {:?}", panic_info);
        process::exit(101);
    }));

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::args::parse_args();
    cli::args::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;
    if !app::colours_enabled(&args, &config_manager)? {
        cli::output::disable_colours();
    }

    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    let registry = app::build_registry(&args, &config_manager)?;
    app::run_command(&args, &config_manager, &registry)
}
