use anyhow::{Context, Result};
use clap::Parser;
use stressrig_config::{ConfigLoader, StressConfig};
use stressrig_logging::init_logging;
use tracing::info;

mod cli;
mod commands;

use cli::{Cli, Commands};

/// Load the configuration and apply command-line overrides
fn load_config(cli: &Cli) -> Result<StressConfig> {
    let path = cli.command.config_path();
    let mut config = ConfigLoader::new()
        .from_file(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    init_logging(&config.logging)?;
    info!("Stressrig CLI starting");

    match cli.command {
        Commands::Run { suites, json, .. } => commands::run::execute(&config, &suites, json).await,
        Commands::Validate { .. } => commands::validate::execute(&config),
        Commands::Status { resource, .. } => commands::status::execute(&config, &resource).await,
    }
}
