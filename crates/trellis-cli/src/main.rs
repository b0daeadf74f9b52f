use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use trellis_cli::{
    cli::{Cli, Commands},
    commands, logging,
};
use trellis_config::ConfigLoader;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    // Command-line level beats the config file
    let level = cli
        .requested_level()
        .unwrap_or_else(|| logging::parse_level(&config.logging.level));
    logging::init(level);
    debug!("Loaded configuration: {:?}", config);

    match cli.command {
        Commands::Eval { graph, expr } => commands::eval::execute(&config, graph, expr).await?,
        Commands::Explain { graph, expr } => commands::explain::execute(&config, graph, expr).await?,
        Commands::Refs { graph, markdown } => commands::refs::execute(&config, graph, markdown).await?,
    }

    Ok(())
}
